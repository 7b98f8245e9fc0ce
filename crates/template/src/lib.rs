//! # Template — synthetic entry generation
//!
//! Produces a lazy, finite stream of directory entries from a template file
//! describing a hierarchy: branches, per-template entry counts and
//! attribute value expressions. Used to seed an LDIF-backed backend with
//! sample data.
//!
//! ```no_run
//! use template::GeneratorBuilder;
//!
//! let generator = GeneratorBuilder::new("example.template")
//!     .seed(42)
//!     .constant("suffix", "dc=example,dc=com")
//!     .build()?;
//! for warning in generator.warnings() {
//!     eprintln!("{}", warning);
//! }
//! for entry in generator {
//!     println!("{}", entry.dn());
//! }
//! # Ok::<(), template::TemplateError>(())
//! ```
//!
//! All parsing and validation happens in [`GeneratorBuilder::build`]; a
//! failure there is the generator-construction error. Non-fatal issues
//! (unknown tags, undefined constants, skipped lines) are collected and
//! exposed through [`EntryGenerator::warnings`]. Generation itself cannot
//! fail: the iterator yields plain entries, depth-first below each branch,
//! and the same template, seed and constants always yield the same stream.

mod parse;

use std::collections::HashMap;
use std::io;
use std::path::PathBuf;

use dn::{Dn, Rdn};
use entry::Entry;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use thiserror::Error;

use parse::{AttrLine, Piece, Subordinate, TemplateFile};

/// Failures while constructing a generator.
#[derive(Debug, Error)]
pub enum TemplateError {
    /// The template file could not be read.
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// A structural problem in the template file.
    #[error("template line {line}: {message}")]
    Parse { line: usize, message: String },

    /// A `subordinateTemplate` line names a template that does not exist.
    #[error("unknown template '{0}' referenced by subordinateTemplate")]
    UnknownTemplate(String),

    /// A template never generates a value for its own RDN attribute.
    #[error("template '{name}' does not define its RDN attribute '{rdn_attr}'")]
    MissingRdnAttr { name: String, rdn_attr: String },

    /// A `<file:...>` resource could not be read.
    #[error("cannot read resource file '{name}': {source}")]
    Resource { name: String, source: io::Error },
}

/// Configures and builds an [`EntryGenerator`].
#[derive(Debug, Clone)]
pub struct GeneratorBuilder {
    template_path: PathBuf,
    resource_path: Option<PathBuf>,
    seed: u64,
    constants: HashMap<String, String>,
    generate_branch_entries: bool,
}

impl GeneratorBuilder {
    /// Starts a builder for the given template file.
    pub fn new(template_path: impl Into<PathBuf>) -> GeneratorBuilder {
        GeneratorBuilder {
            template_path: template_path.into(),
            resource_path: None,
            seed: 0,
            constants: HashMap::new(),
            generate_branch_entries: true,
        }
    }

    /// Directory searched for `<file:...>` resources. Defaults to the
    /// template file's own directory.
    pub fn resource_path(mut self, path: impl Into<PathBuf>) -> GeneratorBuilder {
        self.resource_path = Some(path.into());
        self
    }

    /// Seed for the random value tags; the default of 0 is deterministic
    /// too.
    pub fn seed(mut self, seed: u64) -> GeneratorBuilder {
        self.seed = seed;
        self
    }

    /// Overrides a template constant.
    pub fn constant(
        mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> GeneratorBuilder {
        self.constants.insert(name.into(), value.into());
        self
    }

    /// Whether the branch entries themselves are emitted (on by default).
    /// Turn off when seeding a tree whose branches already exist.
    pub fn generate_branch_entries(mut self, yes: bool) -> GeneratorBuilder {
        self.generate_branch_entries = yes;
        self
    }

    /// Parses and validates the template file.
    pub fn build(self) -> Result<EntryGenerator, TemplateError> {
        let file = parse::parse_file(
            &self.template_path,
            self.resource_path.as_deref(),
            &self.constants,
        )?;
        Ok(EntryGenerator {
            file,
            rng: StdRng::seed_from_u64(self.seed),
            generate_branch_entries: self.generate_branch_entries,
            next_branch: 0,
            stack: Vec::new(),
            emitted: HashMap::new(),
        })
    }
}

/// One pending run of a template below a parent DN.
#[derive(Debug)]
struct Frame {
    template: String, // lowercased key
    parent: Dn,
    remaining: u64,
}

/// A lazy, finite, non-restartable stream of generated entries.
#[derive(Debug)]
pub struct EntryGenerator {
    file: TemplateFile,
    rng: StdRng,
    generate_branch_entries: bool,
    next_branch: usize,
    stack: Vec<Frame>,
    /// Entries emitted per template, drives `<sequence>` tags.
    emitted: HashMap<String, u64>,
}

impl EntryGenerator {
    /// Non-fatal issues found while parsing the template file.
    pub fn warnings(&self) -> &[String] {
        &self.file.warnings
    }

    fn next_entry(&mut self) -> Option<Entry> {
        loop {
            // drain the deepest pending template run first
            if let Some(frame) = self.stack.last_mut() {
                if frame.remaining == 0 {
                    self.stack.pop();
                    continue;
                }
                frame.remaining -= 1;
                let key = frame.template.clone();
                let parent = frame.parent.clone();
                return Some(self.generate_from_template(&key, &parent));
            }

            // then move on to the next branch
            let branch_index = self.next_branch;
            if branch_index >= self.file.branches.len() {
                return None;
            }
            self.next_branch += 1;

            let branch = &self.file.branches[branch_index];
            push_frames(&mut self.stack, &branch.subordinates, &branch.dn);

            if self.generate_branch_entries {
                return Some(self.generate_branch(branch_index));
            }
        }
    }

    fn generate_branch(&mut self, branch_index: usize) -> Entry {
        let branch = &self.file.branches[branch_index];
        let seq_key = format!("branch#{}", branch_index);
        let values = eval_lines(
            &branch.attr_lines,
            &seq_key,
            &self.file.resources,
            &self.emitted,
            &mut self.rng,
        );

        let dn = &branch.dn;
        let mut entry = Entry::new(dn.clone());
        let explicit_object_class = values
            .iter()
            .any(|(name, _)| name.eq_ignore_ascii_case("objectClass"));
        if !explicit_object_class {
            entry.put("objectClass", &b"top"[..]);
            let structural = dn
                .rdn()
                .map(|rdn| branch_object_class(rdn.attr()))
                .unwrap_or("untypedObject");
            entry.put("objectClass", structural.as_bytes());
        }
        if let Some(rdn) = dn.rdn() {
            let rdn_listed = values
                .iter()
                .any(|(name, _)| name.eq_ignore_ascii_case(rdn.attr()));
            if !rdn_listed {
                entry.put(rdn.attr(), rdn.value().as_bytes());
            }
        }
        for (name, value) in values {
            entry.put(&name, value.into_bytes());
        }

        *self.emitted.entry(seq_key).or_insert(0) += 1;
        entry
    }

    fn generate_from_template(&mut self, key: &str, parent: &Dn) -> Entry {
        let template = &self.file.templates[key];
        let values = eval_lines(
            &template.attr_lines,
            key,
            &self.file.resources,
            &self.emitted,
            &mut self.rng,
        );

        let rdn_attr = &template.rdn_attr;
        let rdn_value = values
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(rdn_attr))
            .map(|(_, v)| v.as_str())
            .unwrap_or_default();

        let dn = Dn::child_of(Rdn::new(rdn_attr.clone(), rdn_value), parent);
        let mut entry = Entry::new(dn.clone());
        for (name, value) in values {
            entry.put(&name, value.into_bytes());
        }

        push_frames(&mut self.stack, &template.subordinates, &dn);
        *self.emitted.entry(key.to_string()).or_insert(0) += 1;
        entry
    }
}

impl Iterator for EntryGenerator {
    type Item = Entry;

    fn next(&mut self) -> Option<Entry> {
        self.next_entry()
    }
}

/// Evaluates attribute lines in file order; later lines can reference the
/// values of earlier ones with `{attr}`.
fn eval_lines(
    lines: &[AttrLine],
    seq_key: &str,
    resources: &HashMap<String, Vec<String>>,
    emitted: &HashMap<String, u64>,
    rng: &mut StdRng,
) -> Vec<(String, String)> {
    let mut values: Vec<(String, String)> = Vec::with_capacity(lines.len());
    for line in lines {
        let mut value = String::new();
        for piece in &line.pieces {
            match piece {
                Piece::Literal(s) => value.push_str(s),
                Piece::AttrRef(name) => {
                    if let Some((_, v)) = values.iter().find(|(n, _)| n.eq_ignore_ascii_case(name))
                    {
                        value.push_str(v);
                    }
                }
                Piece::Sequence { start } => {
                    let n = start + emitted.get(seq_key).copied().unwrap_or(0);
                    value.push_str(&n.to_string());
                }
                Piece::RandomAlpha(n) => {
                    for _ in 0..*n {
                        value.push((b'a' + rng.gen_range(0..26)) as char);
                    }
                }
                Piece::RandomNumeric(n) => {
                    for _ in 0..*n {
                        value.push((b'0' + rng.gen_range(0..10)) as char);
                    }
                }
                Piece::FileLine(name) => {
                    if let Some(lines) = resources.get(name) {
                        if !lines.is_empty() {
                            let pick = rng.gen_range(0..lines.len());
                            value.push_str(&lines[pick]);
                        }
                    }
                }
            }
        }
        values.push((line.name.clone(), value));
    }
    values
}

/// Queues the subordinate runs of a just-generated entry, keeping file
/// order depth-first.
fn push_frames(stack: &mut Vec<Frame>, subordinates: &[Subordinate], parent: &Dn) {
    for sub in subordinates.iter().rev() {
        stack.push(Frame {
            template: sub.template.to_lowercase(),
            parent: parent.clone(),
            remaining: sub.count,
        });
    }
}

/// Structural object class for a branch entry, from its RDN attribute.
fn branch_object_class(attr: &str) -> &'static str {
    match attr.to_lowercase().as_str() {
        "dc" => "domain",
        "o" => "organization",
        "ou" => "organizationalUnit",
        "c" => "country",
        "l" => "locality",
        _ => "untypedObject",
    }
}
