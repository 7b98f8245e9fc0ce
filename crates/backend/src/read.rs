//! Read path: lookups, counts, search and export.
//!
//! Every operation here takes the read side of the backend lock, serves
//! the answer from the in-memory tree and returns deep copies, so nothing
//! handed out can alias the store after the lock is released.

use std::io::Write;

use dn::Dn;
use entry::{Entry, Filter};
use ldif::LdifWriter;
use tree::SearchScope;

use crate::{BackendError, LdifBackend};

impl LdifBackend {
    /// Number of entries currently held, including the base entry.
    pub fn entry_count(&self) -> usize {
        self.state.read().tree.len()
    }

    /// Returns a deep copy of the entry at `dn`, or `None`.
    pub fn get_entry(&self, dn: &Dn) -> Result<Option<Entry>, BackendError> {
        let state = self.state.read();
        Self::check_open(&state)?;
        Ok(state.tree.get_entry(dn))
    }

    /// True when an entry with this DN exists.
    pub fn entry_exists(&self, dn: &Dn) -> Result<bool, BackendError> {
        let state = self.state.read();
        Self::check_open(&state)?;
        Ok(state.tree.exists(dn))
    }

    /// Whether the entry at `dn` has at least one child.
    pub fn has_subordinates(&self, dn: &Dn) -> Result<bool, BackendError> {
        let state = self.state.read();
        Self::check_open(&state)?;
        Ok(state.tree.has_children(dn)?)
    }

    /// Counts immediate children, or all descendants when `subtree`.
    pub fn num_subordinates(&self, dn: &Dn, subtree: bool) -> Result<u64, BackendError> {
        let state = self.state.read();
        Self::check_open(&state)?;
        Ok(state.tree.count_subordinates(dn, subtree)?)
    }

    /// Runs a search, invoking `on_entry` with a deep copy of every match.
    ///
    /// The base entry must exist when it falls under this backend;
    /// otherwise the error carries the deepest existing ancestor as the
    /// matched DN.
    pub fn search(
        &self,
        base: &Dn,
        scope: SearchScope,
        filter: &Filter,
        on_entry: impl FnMut(Entry),
    ) -> Result<(), BackendError> {
        let state = self.state.read();
        Self::check_open(&state)?;
        state.tree.search(base, scope, filter, on_entry)?;
        Ok(())
    }

    /// Writes every entry to `writer`, parents before children.
    pub fn export_ldif<W: Write>(&self, writer: &mut LdifWriter<W>) -> Result<(), BackendError> {
        let state = self.state.read();
        Self::check_open(&state)?;
        for entry in state.tree.iter() {
            writer.write_entry(entry).map_err(|e| {
                BackendError::ServerError(format!(
                    "cannot write entry {} to LDIF: {}",
                    entry.dn(),
                    e
                ))
            })?;
        }
        writer
            .flush()
            .map_err(|e| BackendError::ServerError(e.to_string()))?;
        Ok(())
    }
}
