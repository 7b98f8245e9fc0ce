//! Bulk loader shared by startup and the import operation.
//!
//! The store is cleared first, then records are admitted one by one in file
//! order: the base entry unconditionally, anything else only when it falls
//! under the base DN and its parent has already been loaded. Rejected
//! records (duplicate, out of scope, missing parent, undecodable) are
//! logged and counted but never abort the load; only an unrecoverable
//! codec error does, and it leaves the store cleared.

use std::io::BufRead;

use ldif::LdifReader;
use tracing::warn;
use tree::TreeStore;

use crate::{writer, BackendError, LdifBackend};

/// Counters returned by an import.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportResult {
    /// Records decoded from the stream, including later-rejected ones.
    pub entries_read: u64,
    /// Records not admitted into the tree.
    pub entries_rejected: u64,
    /// Records skipped without processing.
    pub entries_ignored: u64,
}

impl LdifBackend {
    /// Replaces the whole tree with the contents of `reader`, then rewrites
    /// the backing dump file.
    pub fn import_ldif<R: BufRead>(
        &self,
        reader: LdifReader<R>,
    ) -> Result<ImportResult, BackendError> {
        let mut state = self.state.write();
        Self::check_open(&state)?;
        load_into(&mut state.tree, reader, Some(self))
    }
}

/// Loads `reader` into `tree`. When `rewrite_for` is given the dump file
/// is re-emitted after a successful load; startup passes `None` because
/// the file being read is already the authoritative copy.
pub(crate) fn load_into<R: BufRead>(
    tree: &mut TreeStore,
    mut reader: LdifReader<R>,
    rewrite_for: Option<&LdifBackend>,
) -> Result<ImportResult, BackendError> {
    tree.clear();

    loop {
        let entry = match reader.read_entry() {
            Ok(Some(entry)) => entry,
            Ok(None) => break,
            Err(e) if e.can_continue() => {
                warn!("skipping malformed record: {}", e);
                continue;
            }
            Err(e) => {
                // unrecoverable: abort with the store cleared
                tree.clear();
                return Err(BackendError::ServerError(format!(
                    "error reading LDIF: {}",
                    e
                )));
            }
        };

        let dn = entry.dn();
        if tree.exists(dn) {
            warn!(dn = %dn, "rejecting duplicate entry");
            reader.reject_last_entry();
            continue;
        }

        if dn != tree.suffix() && !dn.is_descendant_of(tree.suffix()) {
            warn!(dn = %dn, suffix = %tree.suffix(), "rejecting entry outside the base DN");
            reader.reject_last_entry();
            continue;
        }

        if let Err(e) = tree.add(&entry) {
            warn!(dn = %dn, "rejecting entry without parent: {}", e);
            reader.reject_last_entry();
            continue;
        }
    }

    if let Some(backend) = rewrite_for {
        writer::rewrite_dump(&backend.ldif_path, tree)?;
    }

    Ok(ImportResult {
        entries_read: reader.entries_read(),
        entries_rejected: reader.entries_rejected(),
        entries_ignored: reader.entries_ignored(),
    })
}
