//! # Entry — directory records
//!
//! An [`Entry`] is a DN plus an attribute multimap: attribute type to a
//! multiset of binary values. Attribute types are looked up
//! case-insensitively but keep the spelling they were first added with, so a
//! record read as `objectClass` is written back the same way.
//!
//! Entries are value types. `Clone` produces a fully independent deep copy;
//! the tree store relies on this to guarantee that entries handed to callers
//! can never alias stored state.
//!
//! The crate also hosts [`Filter`], the search predicate an entry is matched
//! against. The evaluator covers the standard parenthesised string form with
//! `and`/`or`/`not`, presence, equality and substring assertions.

mod filter;

use std::collections::BTreeMap;

use dn::Dn;

pub use filter::{Filter, FilterError};

/// One attribute: the first-seen spelling of the type plus its values.
///
/// Values are an insertion-ordered multiset; duplicates are allowed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    name: String,
    values: Vec<Vec<u8>>,
}

impl Attribute {
    fn new(name: &str) -> Attribute {
        Attribute {
            name: name.to_string(),
            values: Vec::new(),
        }
    }

    /// The attribute type in its original spelling.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The attribute values in insertion order.
    pub fn values(&self) -> &[Vec<u8>] {
        &self.values
    }

    /// True when any value matches `needle` ASCII-case-insensitively.
    pub fn contains(&self, needle: &[u8]) -> bool {
        self.values.iter().any(|v| v.eq_ignore_ascii_case(needle))
    }
}

/// A directory record: DN plus attribute multimap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    dn: Dn,
    // keyed by lowercased attribute type
    attributes: BTreeMap<String, Attribute>,
}

impl Entry {
    /// Creates an entry with no attributes.
    pub fn new(dn: Dn) -> Entry {
        Entry {
            dn,
            attributes: BTreeMap::new(),
        }
    }

    /// The entry's DN.
    pub fn dn(&self) -> &Dn {
        &self.dn
    }

    /// Re-keys the entry under a new DN (used by subtree rename).
    pub fn set_dn(&mut self, dn: Dn) {
        self.dn = dn;
    }

    /// Appends one value to the named attribute, creating it if absent.
    pub fn put(&mut self, name: &str, value: impl Into<Vec<u8>>) {
        self.attributes
            .entry(name.to_lowercase())
            .or_insert_with(|| Attribute::new(name))
            .values
            .push(value.into());
    }

    /// Looks up an attribute case-insensitively.
    pub fn attr(&self, name: &str) -> Option<&Attribute> {
        self.attributes.get(&name.to_lowercase())
    }

    /// True when the attribute exists with at least one value.
    pub fn has_attribute(&self, name: &str) -> bool {
        self.attr(name).map(|a| !a.values.is_empty()).unwrap_or(false)
    }

    /// The first value of the named attribute, if any.
    pub fn first_value(&self, name: &str) -> Option<&[u8]> {
        self.attr(name).and_then(|a| a.values.first()).map(Vec::as_slice)
    }

    /// Iterates attributes in lowercase-name order.
    pub fn attributes(&self) -> impl Iterator<Item = &Attribute> {
        self.attributes.values()
    }

    /// Number of distinct attribute types.
    pub fn attribute_count(&self) -> usize {
        self.attributes.len()
    }

    /// Evaluates a search filter against this entry.
    pub fn matches(&self, filter: &Filter) -> bool {
        filter.matches(self)
    }
}
