//! Template file model and parser.
//!
//! A template file is line oriented:
//!
//! ```text
//! define suffix=dc=example,dc=com
//!
//! branch: [suffix]
//! subordinateTemplate: person:100
//!
//! template: person
//! rdnAttr: uid
//! objectClass: inetOrgPerson
//! uid: user.<sequence>
//! cn: <file:first.names> <file:last.names>
//! mail: {uid}@[maildomain]
//! ```
//!
//! `define` lines introduce constants, referenced as `[name]` anywhere
//! below (command-line constants override them). A `branch:` or
//! `template:` line opens a block that runs until the next block or end of
//! file. Structural problems that have a sensible fallback (unknown tag,
//! undefined constant, attribute line without a colon) are reported as
//! warnings; everything else fails the parse.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use dn::Dn;

use crate::TemplateError;

/// One piece of an attribute value template.
#[derive(Debug, Clone)]
pub(crate) enum Piece {
    Literal(String),
    /// `{attr}` — value of an attribute generated earlier for this entry.
    AttrRef(String),
    /// `<sequence>` / `<sequence:start>` — per-template counter.
    Sequence { start: u64 },
    /// `<random:alpha:N>` — N random lowercase letters.
    RandomAlpha(usize),
    /// `<random:numeric:N>` — N random digits.
    RandomNumeric(usize),
    /// `<file:name>` — uniform random line from a resource file.
    FileLine(String),
}

/// An `attr: value-template` line.
#[derive(Debug, Clone)]
pub(crate) struct AttrLine {
    pub name: String,
    pub pieces: Vec<Piece>,
}

/// A `subordinateTemplate: name:count` reference.
#[derive(Debug, Clone)]
pub(crate) struct Subordinate {
    pub template: String,
    pub count: u64,
}

#[derive(Debug)]
pub(crate) struct Branch {
    pub dn: Dn,
    pub subordinates: Vec<Subordinate>,
    pub attr_lines: Vec<AttrLine>,
}

#[derive(Debug)]
pub(crate) struct Template {
    pub name: String,
    pub rdn_attr: String,
    pub subordinates: Vec<Subordinate>,
    pub attr_lines: Vec<AttrLine>,
}

/// Everything a parse produces: the structure, the loaded resource files
/// and the accumulated warnings.
#[derive(Debug, Default)]
pub(crate) struct TemplateFile {
    pub branches: Vec<Branch>,
    /// Keyed by lowercased template name.
    pub templates: HashMap<String, Template>,
    /// Lines of each `<file:...>` resource, keyed by file name.
    pub resources: HashMap<String, Vec<String>>,
    pub warnings: Vec<String>,
}

pub(crate) fn parse_file(
    path: &Path,
    resource_path: Option<&Path>,
    overrides: &HashMap<String, String>,
) -> Result<TemplateFile, TemplateError> {
    let text = fs::read_to_string(path)?;
    let resource_dir = resource_path
        .map(Path::to_path_buf)
        .or_else(|| path.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."));
    parse_lines(&text, &resource_dir, overrides)
}

fn parse_lines(
    text: &str,
    resource_dir: &Path,
    overrides: &HashMap<String, String>,
) -> Result<TemplateFile, TemplateError> {
    let mut out = TemplateFile::default();

    // first pass: constants, so a define can be referenced above its use
    let mut constants: HashMap<String, String> = HashMap::new();
    for line in text.lines() {
        if let Some(rest) = line.trim().strip_prefix("define ") {
            if let Some((name, value)) = rest.split_once('=') {
                constants.insert(name.trim().to_string(), value.trim().to_string());
            }
        }
    }
    for (name, value) in overrides {
        constants.insert(name.clone(), value.clone());
    }

    // second pass: structure
    enum Block {
        None,
        Branch(Branch),
        Template(TemplateDraft),
    }
    struct TemplateDraft {
        name: String,
        rdn_attr: Option<String>,
        subordinates: Vec<Subordinate>,
        attr_lines: Vec<AttrLine>,
        first_line: usize,
    }

    let mut block = Block::None;

    let mut close = |out: &mut TemplateFile, block: Block| -> Result<(), TemplateError> {
        match block {
            Block::None => Ok(()),
            Block::Branch(b) => {
                out.branches.push(b);
                Ok(())
            }
            Block::Template(d) => {
                let rdn_attr = d.rdn_attr.ok_or_else(|| TemplateError::Parse {
                    line: d.first_line,
                    message: format!("template '{}' has no rdnAttr line", d.name),
                })?;
                if !d
                    .attr_lines
                    .iter()
                    .any(|l| l.name.eq_ignore_ascii_case(&rdn_attr))
                {
                    return Err(TemplateError::MissingRdnAttr {
                        name: d.name.clone(),
                        rdn_attr,
                    });
                }
                let key = d.name.to_lowercase();
                if out.templates.contains_key(&key) {
                    out.warnings
                        .push(format!("duplicate template '{}' ignored", d.name));
                } else {
                    out.templates.insert(
                        key,
                        Template {
                            name: d.name,
                            rdn_attr,
                            subordinates: d.subordinates,
                            attr_lines: d.attr_lines,
                        },
                    );
                }
                Ok(())
            }
        }
    };

    for (idx, raw) in text.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw.trim_end();
        let trimmed = line.trim();

        if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with("define ") {
            continue;
        }

        let line = substitute_constants(trimmed, &constants, &mut out.warnings);

        if let Some(rest) = keyword(&line, "branch") {
            let dn = Dn::parse(rest.trim()).map_err(|e| TemplateError::Parse {
                line: line_no,
                message: format!("invalid branch DN '{}': {}", rest.trim(), e),
            })?;
            close(&mut out, std::mem::replace(&mut block, Block::None))?;
            block = Block::Branch(Branch {
                dn,
                subordinates: Vec::new(),
                attr_lines: Vec::new(),
            });
            continue;
        }

        if let Some(rest) = keyword(&line, "template") {
            close(&mut out, std::mem::replace(&mut block, Block::None))?;
            block = Block::Template(TemplateDraft {
                name: rest.trim().to_string(),
                rdn_attr: None,
                subordinates: Vec::new(),
                attr_lines: Vec::new(),
                first_line: line_no,
            });
            continue;
        }

        if let Some(rest) = keyword(&line, "subordinateTemplate") {
            let sub = parse_subordinate(rest.trim(), line_no)?;
            match &mut block {
                Block::Branch(b) => b.subordinates.push(sub),
                Block::Template(d) => d.subordinates.push(sub),
                Block::None => {
                    return Err(TemplateError::Parse {
                        line: line_no,
                        message: "subordinateTemplate outside branch or template".to_string(),
                    })
                }
            }
            continue;
        }

        if let Some(rest) = keyword(&line, "rdnAttr") {
            match &mut block {
                Block::Template(d) => d.rdn_attr = Some(rest.trim().to_string()),
                _ => {
                    return Err(TemplateError::Parse {
                        line: line_no,
                        message: "rdnAttr outside a template".to_string(),
                    })
                }
            }
            continue;
        }

        // plain attribute line
        let Some((name, value)) = line.split_once(':') else {
            out.warnings.push(format!(
                "line {}: '{}' is not an attribute line, skipped",
                line_no, line
            ));
            continue;
        };
        let attr_line = AttrLine {
            name: name.trim().to_string(),
            pieces: parse_pieces(value.trim(), line_no, &mut out.warnings),
        };
        match &mut block {
            Block::Branch(b) => b.attr_lines.push(attr_line),
            Block::Template(d) => d.attr_lines.push(attr_line),
            Block::None => {
                out.warnings.push(format!(
                    "line {}: attribute line outside branch or template, skipped",
                    line_no
                ));
            }
        }
    }
    close(&mut out, block)?;

    // every subordinateTemplate must resolve
    let referenced: Vec<String> = out
        .branches
        .iter()
        .flat_map(|b| b.subordinates.iter())
        .chain(out.templates.values().flat_map(|t| t.subordinates.iter()))
        .map(|s| s.template.clone())
        .collect();
    for name in &referenced {
        if !out.templates.contains_key(&name.to_lowercase()) {
            return Err(TemplateError::UnknownTemplate(name.clone()));
        }
    }

    // load every referenced resource file up front
    let mut file_names: Vec<String> = Vec::new();
    let all_lines = out
        .branches
        .iter()
        .flat_map(|b| b.attr_lines.iter())
        .chain(out.templates.values().flat_map(|t| t.attr_lines.iter()));
    for line in all_lines {
        for piece in &line.pieces {
            if let Piece::FileLine(name) = piece {
                if !file_names.contains(name) {
                    file_names.push(name.clone());
                }
            }
        }
    }
    for name in file_names {
        let path = resource_dir.join(&name);
        let text = fs::read_to_string(&path).map_err(|source| TemplateError::Resource {
            name: name.clone(),
            source,
        })?;
        let lines: Vec<String> = text
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect();
        if lines.is_empty() {
            out.warnings
                .push(format!("resource file '{}' is empty", name));
        }
        out.resources.insert(name, lines);
    }

    Ok(out)
}

/// Matches `keyword: rest`, case-insensitively on the keyword.
fn keyword<'a>(line: &'a str, kw: &str) -> Option<&'a str> {
    let (head, rest) = line.split_once(':')?;
    head.trim().eq_ignore_ascii_case(kw).then_some(rest)
}

fn parse_subordinate(s: &str, line_no: usize) -> Result<Subordinate, TemplateError> {
    let (template, count) = s.split_once(':').ok_or_else(|| TemplateError::Parse {
        line: line_no,
        message: format!("subordinateTemplate '{}' is not name:count", s),
    })?;
    let count = count.trim().parse().map_err(|_| TemplateError::Parse {
        line: line_no,
        message: format!("subordinateTemplate count '{}' is not a number", count.trim()),
    })?;
    Ok(Subordinate {
        template: template.trim().to_string(),
        count,
    })
}

/// Replaces `[name]` constant references; unknown names stay literal and
/// produce one warning each.
fn substitute_constants(
    line: &str,
    constants: &HashMap<String, String>,
    warnings: &mut Vec<String>,
) -> String {
    let mut out = String::with_capacity(line.len());
    let mut rest = line;
    while let Some(open) = rest.find('[') {
        out.push_str(&rest[..open]);
        match rest[open..].find(']') {
            Some(close_rel) => {
                let name = &rest[open + 1..open + close_rel];
                match constants.get(name) {
                    Some(value) => out.push_str(value),
                    None => {
                        let warning = format!("undefined constant '[{}]'", name);
                        if !warnings.contains(&warning) {
                            warnings.push(warning);
                        }
                        out.push_str(&rest[open..open + close_rel + 1]);
                    }
                }
                rest = &rest[open + close_rel + 1..];
            }
            None => {
                out.push_str(&rest[open..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

/// Splits a value template into literal text and tags.
fn parse_pieces(value: &str, line_no: usize, warnings: &mut Vec<String>) -> Vec<Piece> {
    let mut pieces = Vec::new();
    let mut literal = String::new();
    let mut rest = value;

    while !rest.is_empty() {
        let next_tag = rest.find(['<', '{']);
        let Some(at) = next_tag else {
            literal.push_str(rest);
            break;
        };
        literal.push_str(&rest[..at]);
        let closer = if rest.as_bytes()[at] == b'<' { '>' } else { '}' };
        let Some(end_rel) = rest[at..].find(closer) else {
            literal.push_str(&rest[at..]);
            break;
        };
        let body = &rest[at + 1..at + end_rel];
        rest = &rest[at + end_rel + 1..];

        let piece = if closer == '}' {
            Some(Piece::AttrRef(body.trim().to_lowercase()))
        } else {
            parse_angle_tag(body, line_no, warnings)
        };
        match piece {
            Some(p) => {
                if !literal.is_empty() {
                    pieces.push(Piece::Literal(std::mem::take(&mut literal)));
                }
                pieces.push(p);
            }
            // unknown tag: keep it literally
            None => {
                literal.push('<');
                literal.push_str(body);
                literal.push('>');
            }
        }
    }
    if !literal.is_empty() {
        pieces.push(Piece::Literal(literal));
    }
    pieces
}

fn parse_angle_tag(body: &str, line_no: usize, warnings: &mut Vec<String>) -> Option<Piece> {
    let parts: Vec<&str> = body.split(':').map(str::trim).collect();
    match parts.as_slice() {
        ["sequence"] => Some(Piece::Sequence { start: 0 }),
        ["sequence", start] => match start.parse() {
            Ok(start) => Some(Piece::Sequence { start }),
            Err(_) => {
                warnings.push(format!(
                    "line {}: sequence start '{}' is not a number",
                    line_no, start
                ));
                None
            }
        },
        ["random", "alpha", n] => parse_len(n, line_no, warnings).map(Piece::RandomAlpha),
        ["random", "numeric", n] => parse_len(n, line_no, warnings).map(Piece::RandomNumeric),
        ["file", name] => Some(Piece::FileLine(name.to_string())),
        _ => {
            warnings.push(format!("line {}: unknown tag '<{}>'", line_no, body));
            None
        }
    }
}

fn parse_len(n: &str, line_no: usize, warnings: &mut Vec<String>) -> Option<usize> {
    match n.parse() {
        Ok(n) => Some(n),
        Err(_) => {
            warnings.push(format!("line {}: length '{}' is not a number", line_no, n));
            None
        }
    }
}
