//! # DN — distinguished names
//!
//! Hierarchical identifiers for directory entries. A [`Dn`] is an ordered
//! sequence of relative components ([`Rdn`]), stored leaf-first to match the
//! textual form `cn=a,ou=people,dc=example,dc=com`. The empty sequence is the
//! root DN.
//!
//! Comparison rules follow LDAP: attribute types and values are matched
//! case-insensitively, so `CN=Alice` and `cn=alice` name the same entry.
//! `Eq`/`Hash` use the normalized form while `Display` keeps the spelling the
//! DN was parsed with.
//!
//! `Ord` is hierarchical: components are compared from the root end, and a
//! prefix sorts before anything below it. An ordered map keyed by `Dn`
//! therefore iterates parents before children, which the dump emitter relies
//! on.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use thiserror::Error;

/// Errors produced when decoding a DN from its textual form.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DnError {
    /// A component contained no `=` separator.
    #[error("RDN component '{0}' has no attribute/value separator")]
    MissingSeparator(String),

    /// A component had an empty attribute type.
    #[error("RDN component '{0}' has an empty attribute type")]
    EmptyAttributeType(String),

    /// A trailing backslash or a malformed `\XX` hex pair.
    #[error("invalid escape sequence in '{0}'")]
    InvalidEscape(String),
}

/// A single relative distinguished name component, e.g. `cn=Alice`.
///
/// Only single-valued RDNs are supported (no `+` multi-valued form).
#[derive(Debug, Clone)]
pub struct Rdn {
    attr: String,
    value: String,
    norm_attr: String,
    norm_value: String,
}

impl Rdn {
    /// Builds an RDN from an attribute type and value.
    pub fn new(attr: impl Into<String>, value: impl Into<String>) -> Rdn {
        let attr = attr.into();
        let value = value.into();
        let norm_attr = attr.to_lowercase();
        let norm_value = value.to_lowercase();
        Rdn {
            attr,
            value,
            norm_attr,
            norm_value,
        }
    }

    /// The attribute type, in its original spelling.
    pub fn attr(&self) -> &str {
        &self.attr
    }

    /// The attribute value, in its original spelling.
    pub fn value(&self) -> &str {
        &self.value
    }

    fn norm(&self) -> (&str, &str) {
        (&self.norm_attr, &self.norm_value)
    }
}

impl PartialEq for Rdn {
    fn eq(&self, other: &Rdn) -> bool {
        self.norm() == other.norm()
    }
}

impl Eq for Rdn {}

impl Hash for Rdn {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.norm().hash(state);
    }
}

impl PartialOrd for Rdn {
    fn partial_cmp(&self, other: &Rdn) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Rdn {
    fn cmp(&self, other: &Rdn) -> Ordering {
        self.norm().cmp(&other.norm())
    }
}

impl fmt::Display for Rdn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.attr, escape_value(&self.value))
    }
}

/// A distinguished name: a finite ordered sequence of RDNs, leaf-first.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Dn {
    components: Vec<Rdn>,
}

impl Dn {
    /// The root DN (empty component sequence).
    pub fn root() -> Dn {
        Dn {
            components: Vec::new(),
        }
    }

    /// Parses a DN from its textual form, e.g. `ou=people,dc=example,dc=com`.
    ///
    /// An empty or all-whitespace string yields the root DN. Backslash
    /// escapes (`\,`, `\\`, `\=`, ... and `\XX` hex pairs) are decoded.
    pub fn parse(s: &str) -> Result<Dn, DnError> {
        let s = s.trim();
        if s.is_empty() {
            return Ok(Dn::root());
        }

        let mut components = Vec::new();
        for raw in split_unescaped(s, ',') {
            let raw = raw.trim();
            let eq = find_unescaped(raw, '=')
                .ok_or_else(|| DnError::MissingSeparator(raw.to_string()))?;
            let attr = raw[..eq].trim();
            if attr.is_empty() {
                return Err(DnError::EmptyAttributeType(raw.to_string()));
            }
            let value = unescape(raw[eq + 1..].trim())?;
            components.push(Rdn::new(attr, value));
        }
        Ok(Dn { components })
    }

    /// Builds a DN by placing `rdn` directly below `parent`.
    pub fn child_of(rdn: Rdn, parent: &Dn) -> Dn {
        let mut components = Vec::with_capacity(parent.components.len() + 1);
        components.push(rdn);
        components.extend(parent.components.iter().cloned());
        Dn { components }
    }

    /// True for the empty DN.
    pub fn is_root(&self) -> bool {
        self.components.is_empty()
    }

    /// Number of RDN components.
    pub fn num_components(&self) -> usize {
        self.components.len()
    }

    /// The leaf-most RDN, or `None` for the root DN.
    pub fn rdn(&self) -> Option<&Rdn> {
        self.components.first()
    }

    /// The DN one component shorter, or `None` for the root DN.
    pub fn parent(&self) -> Option<Dn> {
        if self.components.is_empty() {
            None
        } else {
            Some(Dn {
                components: self.components[1..].to_vec(),
            })
        }
    }

    /// True when `self` is a strict prefix (proper ancestor) of `other`.
    pub fn is_ancestor_of(&self, other: &Dn) -> bool {
        let n = self.components.len();
        let m = other.components.len();
        if n >= m {
            return false;
        }
        // compare the trailing (root-side) n components of other
        self.components
            .iter()
            .zip(other.components[m - n..].iter())
            .all(|(a, b)| a == b)
    }

    /// True when `self` is a strict descendant of `other`.
    pub fn is_descendant_of(&self, other: &Dn) -> bool {
        other.is_ancestor_of(self)
    }

    /// Iterates the components leaf-first.
    pub fn components(&self) -> impl Iterator<Item = &Rdn> {
        self.components.iter()
    }
}

impl PartialOrd for Dn {
    fn partial_cmp(&self, other: &Dn) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Dn {
    /// Hierarchical order: compare component-wise from the root end; a
    /// prefix sorts before its descendants.
    fn cmp(&self, other: &Dn) -> Ordering {
        let mut a = self.components.iter().rev();
        let mut b = other.components.iter().rev();
        loop {
            match (a.next(), b.next()) {
                (Some(x), Some(y)) => match x.cmp(y) {
                    Ordering::Equal => continue,
                    ord => return ord,
                },
                (None, None) => return Ordering::Equal,
                (None, Some(_)) => return Ordering::Less,
                (Some(_), None) => return Ordering::Greater,
            }
        }
    }
}

impl fmt::Display for Dn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, rdn) in self.components.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{}", rdn)?;
        }
        Ok(())
    }
}

impl FromStr for Dn {
    type Err = DnError;

    fn from_str(s: &str) -> Result<Dn, DnError> {
        Dn::parse(s)
    }
}

/// Splits `s` on every `sep` not preceded by a backslash.
fn split_unescaped(s: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut escaped = false;
    for (i, c) in s.char_indices() {
        if escaped {
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == sep {
            parts.push(&s[start..i]);
            start = i + c.len_utf8();
        }
    }
    parts.push(&s[start..]);
    parts
}

/// Byte index of the first unescaped `sep`, if any.
fn find_unescaped(s: &str, sep: char) -> Option<usize> {
    let mut escaped = false;
    for (i, c) in s.char_indices() {
        if escaped {
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == sep {
            return Some(i);
        }
    }
    None
}

/// Decodes backslash escapes: `\<special>` to the literal character and
/// `\XX` to the byte with that hex value.
fn unescape(s: &str) -> Result<String, DnError> {
    let mut out = Vec::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            let mut buf = [0u8; 4];
            out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
            continue;
        }
        match chars.next() {
            None => return Err(DnError::InvalidEscape(s.to_string())),
            Some(e) if e.is_ascii_hexdigit() => {
                let lo = chars
                    .next()
                    .filter(char::is_ascii_hexdigit)
                    .ok_or_else(|| DnError::InvalidEscape(s.to_string()))?;
                let byte = (e.to_digit(16).unwrap() * 16 + lo.to_digit(16).unwrap()) as u8;
                out.push(byte);
            }
            Some(e) => {
                let mut buf = [0u8; 4];
                out.extend_from_slice(e.encode_utf8(&mut buf).as_bytes());
            }
        }
    }
    String::from_utf8(out).map_err(|_| DnError::InvalidEscape(s.to_string()))
}

/// Escapes the characters that are special inside an RDN value.
fn escape_value(v: &str) -> String {
    let mut out = String::with_capacity(v.len());
    let last = v.len().saturating_sub(1);
    for (i, c) in v.char_indices() {
        match c {
            ',' | '+' | '"' | '\\' | '<' | '>' | ';' | '=' => {
                out.push('\\');
                out.push(c);
            }
            '#' | ' ' if i == 0 => {
                out.push('\\');
                out.push(c);
            }
            // hex form: a trailing "\ " would be eaten by whitespace trimming
            ' ' if i == last => out.push_str("\\20"),
            _ => out.push(c),
        }
    }
    out
}
