//! # Tree — the in-memory directory tree store
//!
//! Holds the whole directory tree under a single suffix DN in two indexes:
//!
//! ```text
//! entries:  Dn -> Entry          (ordered, parents before children)
//! children: Dn -> {child Dn...}  (immediate children of each non-leaf)
//! ```
//!
//! `entries` is a `BTreeMap` keyed by the hierarchical DN order, so plain
//! iteration visits every parent before any of its descendants — the dump
//! emitter and the loader both rely on that. `children` mirrors the
//! parent/child edges; a key with an empty set must not exist, and the two
//! indexes are only ever updated together through `link_child` /
//! `unlink_child`.
//!
//! The store does no locking and no I/O. The backend facade wraps it in a
//! reader-writer lock and persists it after each mutation. Every entry that
//! leaves the store is a deep copy, so a returned entry can never alias
//! stored state.

use std::collections::{BTreeMap, HashMap, HashSet};

use dn::Dn;
use entry::{Entry, Filter};
use thiserror::Error;

/// The scope of a search relative to its base DN.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchScope {
    /// The base entry only.
    BaseObject,
    /// Immediate children of the base, excluding the base itself.
    SingleLevel,
    /// The base entry and all of its descendants.
    WholeSubtree,
    /// All descendants of the base, excluding the base itself.
    Subordinates,
}

impl SearchScope {
    fn contains(self, base: &Dn, dn: &Dn) -> bool {
        match self {
            SearchScope::BaseObject => dn == base,
            SearchScope::SingleLevel => dn.parent().map(|p| &p == base).unwrap_or(false),
            SearchScope::WholeSubtree => dn == base || base.is_ancestor_of(dn),
            SearchScope::Subordinates => base.is_ancestor_of(dn),
        }
    }
}

/// Store-level failures. The matched DN diagnostic (the deepest existing
/// ancestor of the requested DN) travels as structured data, not message
/// text.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TreeError {
    /// The target entry, or a required ancestor of it, does not exist.
    #[error("entry {dn} does not exist")]
    NoSuchEntry { dn: Dn, matched: Option<Dn> },

    /// An add or rename target collides with an existing entry.
    #[error("entry {dn} already exists")]
    AlreadyExists { dn: Dn },

    /// Delete of an entry that still has children, without subtree delete.
    #[error("entry {dn} has subordinate entries")]
    NotAllowedOnNonLeaf { dn: Dn },
}

/// The in-memory tree: every entry under one suffix plus the parent/child
/// index. See the crate docs for the invariants.
#[derive(Debug)]
pub struct TreeStore {
    suffix: Dn,
    entries: BTreeMap<Dn, Entry>,
    children: HashMap<Dn, HashSet<Dn>>,
}

impl TreeStore {
    /// Creates an empty store rooted at `suffix`.
    pub fn new(suffix: Dn) -> TreeStore {
        TreeStore {
            suffix,
            entries: BTreeMap::new(),
            children: HashMap::new(),
        }
    }

    /// The suffix (base DN) this store is rooted at.
    pub fn suffix(&self) -> &Dn {
        &self.suffix
    }

    /// Number of entries currently held.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when the tree holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drops every entry and child edge.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.children.clear();
    }

    /// Iterates entries parents-first (hierarchical DN order).
    pub fn iter(&self) -> impl Iterator<Item = &Entry> {
        self.entries.values()
    }

    /// Returns a deep copy of the entry at `dn`, if present.
    pub fn get_entry(&self, dn: &Dn) -> Option<Entry> {
        self.entries.get(dn).cloned()
    }

    /// True when an entry with this DN exists.
    pub fn exists(&self, dn: &Dn) -> bool {
        self.entries.contains_key(dn)
    }

    /// True when the DN is the suffix or below it.
    pub fn handles(&self, dn: &Dn) -> bool {
        dn == &self.suffix || dn.is_descendant_of(&self.suffix)
    }

    /// Whether the entry at `dn` has at least one child.
    ///
    /// Fails with `NoSuchEntry` when the DN is not in the tree.
    pub fn has_children(&self, dn: &Dn) -> Result<bool, TreeError> {
        match self.children.get(dn) {
            Some(set) if !set.is_empty() => Ok(true),
            _ if self.entries.contains_key(dn) => Ok(false),
            _ => Err(TreeError::NoSuchEntry {
                dn: dn.clone(),
                matched: self.matched_dn(dn),
            }),
        }
    }

    /// Counts immediate children, or every descendant when `subtree`.
    pub fn count_subordinates(&self, dn: &Dn, subtree: bool) -> Result<u64, TreeError> {
        match self.children.get(dn) {
            Some(set) if !set.is_empty() => {
                if !subtree {
                    Ok(set.len() as u64)
                } else {
                    let mut count = 0;
                    for child in set {
                        count += 1 + self.count_subordinates(child, true)?;
                    }
                    Ok(count)
                }
            }
            _ if self.entries.contains_key(dn) => Ok(0),
            _ => Err(TreeError::NoSuchEntry {
                dn: dn.clone(),
                matched: self.matched_dn(dn),
            }),
        }
    }

    /// Inserts a new entry.
    ///
    /// The suffix itself may always be added (bootstrapping an empty tree).
    /// Any other DN requires its parent to exist; otherwise the error
    /// carries the deepest existing ancestor as the matched DN.
    pub fn add(&mut self, entry: &Entry) -> Result<(), TreeError> {
        let dn = entry.dn();
        if self.entries.contains_key(dn) {
            return Err(TreeError::AlreadyExists { dn: dn.clone() });
        }

        if dn == &self.suffix {
            self.entries.insert(dn.clone(), entry.clone());
            return Ok(());
        }

        match self.parent_in_suffix(dn) {
            Some(parent) if self.entries.contains_key(&parent) => {
                self.entries.insert(dn.clone(), entry.clone());
                self.link_child(&parent, dn.clone());
                Ok(())
            }
            _ => Err(TreeError::NoSuchEntry {
                dn: dn.clone(),
                matched: self.matched_dn(dn),
            }),
        }
    }

    /// Removes the entry at `dn`.
    ///
    /// A leaf is always removable. A non-leaf is removed together with its
    /// whole subtree when `allow_subtree` is set, and refused with
    /// `NotAllowedOnNonLeaf` otherwise.
    pub fn delete(&mut self, dn: &Dn, allow_subtree: bool) -> Result<(), TreeError> {
        if !self.entries.contains_key(dn) {
            return Err(TreeError::NoSuchEntry {
                dn: dn.clone(),
                matched: self.matched_dn(dn),
            });
        }

        let has_children = self.children.get(dn).map(|s| !s.is_empty()).unwrap_or(false);
        if has_children && !allow_subtree {
            return Err(TreeError::NotAllowedOnNonLeaf { dn: dn.clone() });
        }

        if let Some(parent) = self.parent_in_suffix(dn) {
            self.unlink_child(&parent, dn);
        }
        self.remove_subtree(dn);
        Ok(())
    }

    /// Replaces the entry at `entry.dn()` with a deep copy of `entry`.
    /// Renaming is a separate operation; the DN must already exist.
    pub fn replace(&mut self, entry: &Entry) -> Result<(), TreeError> {
        let dn = entry.dn();
        if !self.entries.contains_key(dn) {
            return Err(TreeError::NoSuchEntry {
                dn: dn.clone(),
                matched: self.matched_dn(dn),
            });
        }
        self.entries.insert(dn.clone(), entry.clone());
        Ok(())
    }

    /// Moves the entry at `current_dn` (and its whole subtree) to
    /// `new_entry.dn()`.
    ///
    /// Preconditions: `current_dn` exists, the new DN does not, and the new
    /// DN's parent exists. `new_superior_specified` tells whether the
    /// request named a new superior; it decides whether an emptied old
    /// parent child set is pruned (a same-level rename keeps the empty
    /// set).
    pub fn rename(
        &mut self,
        current_dn: &Dn,
        new_entry: &Entry,
        new_superior_specified: bool,
    ) -> Result<(), TreeError> {
        let new_dn = new_entry.dn();

        if !self.entries.contains_key(current_dn) {
            return Err(TreeError::NoSuchEntry {
                dn: current_dn.clone(),
                matched: self.matched_dn(current_dn),
            });
        }
        if self.entries.contains_key(new_dn) {
            return Err(TreeError::AlreadyExists { dn: new_dn.clone() });
        }
        let new_parent = match self.parent_in_suffix(new_dn) {
            Some(p) if self.entries.contains_key(&p) => p,
            other => {
                return Err(TreeError::NoSuchEntry {
                    dn: other.unwrap_or_else(|| new_dn.clone()),
                    matched: None,
                })
            }
        };

        // detach from the old parent; prune an emptied set only when the
        // move names a new superior
        if let Some(old_parent) = self.parent_in_suffix(current_dn) {
            if let Some(set) = self.children.get_mut(&old_parent) {
                set.remove(current_dn);
                if set.is_empty() && new_superior_specified {
                    self.children.remove(&old_parent);
                }
            }
        }

        self.link_child(&new_parent, new_dn.clone());

        // re-root the entry itself, then re-key every descendant
        let child_set = self.children.remove(current_dn);
        self.entries.remove(current_dn);
        self.entries.insert(new_dn.clone(), new_entry.clone());
        if let Some(child_set) = child_set {
            for child in child_set {
                self.subtree_rename(&child, new_dn);
            }
        }
        Ok(())
    }

    /// Runs a search, yielding a deep copy of every matching entry.
    ///
    /// The base must exist; scope and filter are applied to every entry in
    /// the tree (linear scan — this store has no indexes).
    pub fn search(
        &self,
        base: &Dn,
        scope: SearchScope,
        filter: &Filter,
        mut on_entry: impl FnMut(Entry),
    ) -> Result<(), TreeError> {
        let base_entry = match self.entries.get(base) {
            Some(e) => e,
            None => {
                return Err(TreeError::NoSuchEntry {
                    dn: base.clone(),
                    matched: self.matched_dn(base),
                })
            }
        };

        if scope == SearchScope::BaseObject {
            if base_entry.matches(filter) {
                on_entry(base_entry.clone());
            }
            return Ok(());
        }

        for (dn, e) in &self.entries {
            if scope.contains(base, dn) && e.matches(filter) {
                on_entry(e.clone());
            }
        }
        Ok(())
    }

    /// The deepest strict ancestor of `dn` that exists in the tree, within
    /// the suffix. This is the matched-DN diagnostic for `NoSuchEntry`.
    pub fn matched_dn(&self, dn: &Dn) -> Option<Dn> {
        let mut cursor = self.parent_in_suffix(dn);
        while let Some(candidate) = cursor {
            if self.entries.contains_key(&candidate) {
                return Some(candidate);
            }
            cursor = self.parent_in_suffix(&candidate);
        }
        None
    }

    /// The parent of `dn`, as long as it is still the suffix or below it.
    fn parent_in_suffix(&self, dn: &Dn) -> Option<Dn> {
        if dn == &self.suffix {
            return None;
        }
        dn.parent().filter(|p| self.handles(p))
    }

    /// Records `child` under `parent`, creating the set on first use.
    fn link_child(&mut self, parent: &Dn, child: Dn) {
        self.children.entry(parent.clone()).or_default().insert(child);
    }

    /// Removes `child` from `parent`'s set, pruning the set when emptied.
    fn unlink_child(&mut self, parent: &Dn, child: &Dn) {
        if let Some(set) = self.children.get_mut(parent) {
            set.remove(child);
            if set.is_empty() {
                self.children.remove(parent);
            }
        }
    }

    /// Removes `dn` and everything below it from both indexes. The caller
    /// has already detached `dn` from its parent.
    fn remove_subtree(&mut self, dn: &Dn) {
        self.entries.remove(dn);
        if let Some(child_set) = self.children.remove(dn) {
            for child in child_set {
                self.remove_subtree(&child);
            }
        }
    }

    /// Re-keys the subtree rooted at `dn` to sit under `new_parent`,
    /// cloning each entry with its updated DN.
    fn subtree_rename(&mut self, dn: &Dn, new_parent: &Dn) {
        let child_set = self.children.remove(dn);
        let rdn = match dn.rdn() {
            Some(rdn) => rdn.clone(),
            // a stored child DN is never the root
            None => return,
        };
        let new_dn = Dn::child_of(rdn, new_parent);

        if let Some(old_entry) = self.entries.remove(dn) {
            let mut new_entry = old_entry;
            new_entry.set_dn(new_dn.clone());
            self.entries.insert(new_dn.clone(), new_entry);
            self.link_child(new_parent, new_dn.clone());
        }

        if let Some(child_set) = child_set {
            for child in child_set {
                self.subtree_rename(&child, &new_dn);
            }
        }
    }

    /// Asserts the structural invariants; used by tests after mutations.
    #[doc(hidden)]
    pub fn check_invariants(&self) {
        for (dn, entry) in &self.entries {
            assert_eq!(entry.dn(), dn, "entry keyed under a different DN");
            if dn != &self.suffix {
                let parent = self
                    .parent_in_suffix(dn)
                    .unwrap_or_else(|| panic!("{} has no parent within the suffix", dn));
                assert!(
                    self.entries.contains_key(&parent),
                    "{} is present without its parent {}",
                    dn,
                    parent
                );
                assert!(
                    self.children
                        .get(&parent)
                        .map(|s| s.contains(dn))
                        .unwrap_or(false),
                    "{} missing from children[{}]",
                    dn,
                    parent
                );
            }
        }
        for (parent, set) in &self.children {
            for child in set {
                assert_eq!(
                    child.parent().as_ref(),
                    Some(parent),
                    "children[{}] holds non-child {}",
                    parent,
                    child
                );
                assert!(
                    self.entries.contains_key(child),
                    "children[{}] holds unknown entry {}",
                    parent,
                    child
                );
            }
        }
    }
}

#[cfg(test)]
mod tests;
