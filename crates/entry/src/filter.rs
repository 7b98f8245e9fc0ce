//! Search filter representation and evaluation.
//!
//! Parses the parenthesised string form: `(&(objectClass=person)(cn=ab*))`,
//! `(|(...)(...))`, `(!(...))`, presence `(cn=*)`, equality `(cn=alice)` and
//! substring `(cn=a*li*e)` assertions. `\XX` hex escapes are decoded inside
//! assertion values. Matching is ASCII-case-insensitive.

use std::fmt;

use thiserror::Error;

use crate::Entry;

/// Errors produced when decoding a filter string.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FilterError {
    #[error("unexpected end of filter string")]
    UnexpectedEnd,

    #[error("expected '{expected}' at offset {offset}")]
    Expected { expected: char, offset: usize },

    #[error("assertion '{0}' has no attribute/value separator")]
    MissingSeparator(String),

    #[error("invalid escape sequence at offset {0}")]
    InvalidEscape(usize),

    #[error("trailing garbage after filter at offset {0}")]
    TrailingGarbage(usize),
}

/// A search predicate over entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    /// `(attr=*)` — the attribute exists with at least one value.
    Present(String),
    /// `(attr=value)` — some value equals the assertion, ignoring ASCII case.
    Equality(String, Vec<u8>),
    /// `(attr=i*any*f)` — substring match with optional initial/any/final parts.
    Substring {
        attr: String,
        initial: Option<Vec<u8>>,
        any: Vec<Vec<u8>>,
        final_: Option<Vec<u8>>,
    },
    /// `(&(f)(g)...)` — all sub-filters match. An empty `and` is true.
    And(Vec<Filter>),
    /// `(|(f)(g)...)` — at least one sub-filter matches.
    Or(Vec<Filter>),
    /// `(!(f))` — the sub-filter does not match.
    Not(Box<Filter>),
}

impl Filter {
    /// Matches every entry.
    pub fn match_all() -> Filter {
        Filter::And(Vec::new())
    }

    /// Decodes a filter from its string form.
    pub fn parse(s: &str) -> Result<Filter, FilterError> {
        let bytes = s.trim().as_bytes();
        let (filter, rest) = parse_filter(bytes, 0)?;
        if rest != bytes.len() {
            return Err(FilterError::TrailingGarbage(rest));
        }
        Ok(filter)
    }

    /// Evaluates this filter against an entry.
    pub fn matches(&self, entry: &Entry) -> bool {
        match self {
            Filter::Present(attr) => entry.has_attribute(attr),
            Filter::Equality(attr, value) => entry
                .attr(attr)
                .map(|a| a.contains(value))
                .unwrap_or(false),
            Filter::Substring {
                attr,
                initial,
                any,
                final_,
            } => entry
                .attr(attr)
                .map(|a| {
                    a.values()
                        .iter()
                        .any(|v| substring_matches(v, initial, any, final_))
                })
                .unwrap_or(false),
            Filter::And(fs) => fs.iter().all(|f| f.matches(entry)),
            Filter::Or(fs) => fs.iter().any(|f| f.matches(entry)),
            Filter::Not(f) => !f.matches(entry),
        }
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Filter::Present(attr) => write!(f, "({}=*)", attr),
            Filter::Equality(attr, value) => {
                write!(f, "({}={})", attr, String::from_utf8_lossy(value))
            }
            Filter::Substring {
                attr,
                initial,
                any,
                final_,
            } => {
                write!(f, "({}=", attr)?;
                if let Some(i) = initial {
                    write!(f, "{}", String::from_utf8_lossy(i))?;
                }
                for a in any {
                    write!(f, "*{}", String::from_utf8_lossy(a))?;
                }
                f.write_str("*")?;
                if let Some(fin) = final_ {
                    write!(f, "{}", String::from_utf8_lossy(fin))?;
                }
                f.write_str(")")
            }
            Filter::And(fs) => {
                f.write_str("(&")?;
                for sub in fs {
                    write!(f, "{}", sub)?;
                }
                f.write_str(")")
            }
            Filter::Or(fs) => {
                f.write_str("(|")?;
                for sub in fs {
                    write!(f, "{}", sub)?;
                }
                f.write_str(")")
            }
            Filter::Not(sub) => write!(f, "(!{})", sub),
        }
    }
}

fn substring_matches(
    value: &[u8],
    initial: &Option<Vec<u8>>,
    any: &[Vec<u8>],
    final_: &Option<Vec<u8>>,
) -> bool {
    let lower: Vec<u8> = value.to_ascii_lowercase();
    let mut pos = 0;

    if let Some(i) = initial {
        let i = i.to_ascii_lowercase();
        if lower.len() < i.len() || lower[..i.len()] != i[..] {
            return false;
        }
        pos = i.len();
    }

    for part in any {
        let part = part.to_ascii_lowercase();
        match find_from(&lower, &part, pos) {
            Some(at) => pos = at + part.len(),
            None => return false,
        }
    }

    if let Some(fin) = final_ {
        let fin = fin.to_ascii_lowercase();
        if lower.len() < pos + fin.len() {
            return false;
        }
        return lower[lower.len() - fin.len()..] == fin[..];
    }

    true
}

fn find_from(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if needle.is_empty() {
        return Some(from);
    }
    haystack[from..]
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|p| p + from)
}

// Recursive descent over the byte string; returns (filter, next offset).
fn parse_filter(bytes: &[u8], at: usize) -> Result<(Filter, usize), FilterError> {
    let open = expect(bytes, at, b'(')?;
    match bytes.get(open) {
        None => Err(FilterError::UnexpectedEnd),
        Some(b'&') => {
            let (subs, rest) = parse_set(bytes, open + 1)?;
            Ok((Filter::And(subs), rest))
        }
        Some(b'|') => {
            let (subs, rest) = parse_set(bytes, open + 1)?;
            Ok((Filter::Or(subs), rest))
        }
        Some(b'!') => {
            let (sub, rest) = parse_filter(bytes, open + 1)?;
            let rest = expect(bytes, rest, b')')?;
            Ok((Filter::Not(Box::new(sub)), rest))
        }
        Some(_) => parse_assertion(bytes, open),
    }
}

fn expect(bytes: &[u8], at: usize, c: u8) -> Result<usize, FilterError> {
    match bytes.get(at) {
        Some(&b) if b == c => Ok(at + 1),
        Some(_) => Err(FilterError::Expected {
            expected: c as char,
            offset: at,
        }),
        None => Err(FilterError::UnexpectedEnd),
    }
}

fn parse_set(bytes: &[u8], mut at: usize) -> Result<(Vec<Filter>, usize), FilterError> {
    let mut subs = Vec::new();
    loop {
        match bytes.get(at) {
            Some(b')') => return Ok((subs, at + 1)),
            Some(b'(') => {
                let (sub, rest) = parse_filter(bytes, at)?;
                subs.push(sub);
                at = rest;
            }
            Some(_) => {
                return Err(FilterError::Expected {
                    expected: '(',
                    offset: at,
                })
            }
            None => return Err(FilterError::UnexpectedEnd),
        }
    }
}

fn parse_assertion(bytes: &[u8], at: usize) -> Result<(Filter, usize), FilterError> {
    let close = bytes[at..]
        .iter()
        .position(|&b| b == b')')
        .map(|p| p + at)
        .ok_or(FilterError::UnexpectedEnd)?;
    let body = &bytes[at..close];
    let eq = body
        .iter()
        .position(|&b| b == b'=')
        .ok_or_else(|| FilterError::MissingSeparator(String::from_utf8_lossy(body).into_owned()))?;

    let attr = String::from_utf8_lossy(&body[..eq]).trim().to_string();
    if attr.is_empty() {
        return Err(FilterError::MissingSeparator(
            String::from_utf8_lossy(body).into_owned(),
        ));
    }
    let raw_value = &body[eq + 1..];

    // presence
    if raw_value == b"*" {
        return Ok((Filter::Present(attr), close + 1));
    }

    // split on unescaped '*' to detect substring form
    let mut parts: Vec<Vec<u8>> = vec![Vec::new()];
    let mut i = 0;
    let mut stars = 0usize;
    while i < raw_value.len() {
        match raw_value[i] {
            b'\\' => {
                let hi = raw_value
                    .get(i + 1)
                    .filter(|b| b.is_ascii_hexdigit())
                    .ok_or(FilterError::InvalidEscape(at + eq + 1 + i))?;
                let lo = raw_value
                    .get(i + 2)
                    .filter(|b| b.is_ascii_hexdigit())
                    .ok_or(FilterError::InvalidEscape(at + eq + 1 + i))?;
                let byte = (hex_val(*hi) << 4) | hex_val(*lo);
                parts.last_mut().unwrap().push(byte);
                i += 3;
            }
            b'*' => {
                stars += 1;
                parts.push(Vec::new());
                i += 1;
            }
            b => {
                parts.last_mut().unwrap().push(b);
                i += 1;
            }
        }
    }

    let filter = if stars == 0 {
        Filter::Equality(attr, parts.pop().unwrap())
    } else {
        let final_part = parts.pop().unwrap();
        let initial_part = parts.remove(0);
        Filter::Substring {
            attr,
            initial: (!initial_part.is_empty()).then_some(initial_part),
            any: parts.into_iter().filter(|p| !p.is_empty()).collect(),
            final_: (!final_part.is_empty()).then_some(final_part),
        }
    };
    Ok((filter, close + 1))
}

fn hex_val(b: u8) -> u8 {
    match b {
        b'0'..=b'9' => b - b'0',
        b'a'..=b'f' => b - b'a' + 10,
        _ => b - b'A' + 10,
    }
}
