//! Write path: add, delete, replace and rename.
//!
//! Every mutation takes the write side of the backend lock, applies the
//! change to the in-memory tree and re-emits the backing dump file before
//! the lock is released, so readers always observe memory and disk in
//! agreement.

use dn::Dn;
use entry::Entry;
use tracing::trace;

use crate::{writer, BackendError, Control, LdifBackend, OID_SUBTREE_DELETE_CONTROL};

impl LdifBackend {
    /// Adds a new entry.
    ///
    /// The base entry may always be added (bootstrapping an empty tree);
    /// any other entry requires its parent to exist.
    pub fn add_entry(&self, entry: &Entry) -> Result<(), BackendError> {
        let mut state = self.state.write();
        Self::check_open(&state)?;

        state.tree.add(entry)?;
        trace!(dn = %entry.dn(), "added entry");
        writer::rewrite_dump(&self.ldif_path, &state.tree)
    }

    /// Deletes the entry at `dn`.
    ///
    /// A non-leaf entry is refused unless the request carries the subtree
    /// delete control, in which case the whole subtree goes.
    pub fn delete_entry(&self, dn: &Dn, controls: &[Control]) -> Result<(), BackendError> {
        let subtree = controls
            .iter()
            .any(|c| c.oid == OID_SUBTREE_DELETE_CONTROL);

        let mut state = self.state.write();
        Self::check_open(&state)?;

        state.tree.delete(dn, subtree)?;
        trace!(dn = %dn, subtree, "deleted entry");
        writer::rewrite_dump(&self.ldif_path, &state.tree)
    }

    /// Replaces the entry at `entry.dn()` with a deep copy of `entry`.
    /// The DN must already exist; renaming is [`rename_entry`](Self::rename_entry).
    pub fn replace_entry(&self, entry: &Entry) -> Result<(), BackendError> {
        let mut state = self.state.write();
        Self::check_open(&state)?;

        state.tree.replace(entry)?;
        trace!(dn = %entry.dn(), "replaced entry");
        writer::rewrite_dump(&self.ldif_path, &state.tree)
    }

    /// Moves the entry at `current_dn` (with its whole subtree) to
    /// `new_entry.dn()`. `new_superior` is the newly named parent when the
    /// request relocated the entry rather than just relabelling it.
    ///
    /// Both DNs must fall under this backend; moving an entry into or out
    /// of another backend is refused.
    pub fn rename_entry(
        &self,
        current_dn: &Dn,
        new_entry: &Entry,
        new_superior: Option<&Dn>,
    ) -> Result<(), BackendError> {
        if !self.handles_entry(current_dn) || !self.handles_entry(new_entry.dn()) {
            return Err(BackendError::UnwillingToPerform(
                "modify DN across backends is not supported".to_string(),
            ));
        }

        let mut state = self.state.write();
        Self::check_open(&state)?;

        state
            .tree
            .rename(current_dn, new_entry, new_superior.is_some())?;
        trace!(from = %current_dn, to = %new_entry.dn(), "renamed entry");
        writer::rewrite_dump(&self.ldif_path, &state.tree)
    }
}
