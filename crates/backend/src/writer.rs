//! Atomic rewrite of the backing dump file.
//!
//! Rewrite protocol for backing path `P`:
//!
//! 1. Write the whole tree to `P.new` (truncating any leftover `.new`).
//! 2. Unlink `P.old` if present (best effort).
//! 3. Rename `P` to `P.old` if present (best effort).
//! 4. Rename `P.new` to `P` — the commit point.
//!
//! Steps 2 and 3 are cleanup and may fail without harm (logged at `warn`).
//! A failure in step 1 or 4 leaves the previous dump in place (at `P` or
//! `P.old` respectively), raises the cannot-write-update alert and is
//! surfaced as a server error.
//!
//! The caller must hold the write lock across the whole sequence.

use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use ldif::LdifWriter;
use tracing::{error, warn};
use tree::TreeStore;

use crate::BackendError;

/// Alert raised when the backing file can no longer be rewritten.
pub const ALERT_TYPE_CANNOT_WRITE_UPDATE: &str = "ldif-backend-cannot-write-update";

/// Appends `suffix` to the file name, `dump.ldif` -> `dump.ldif.new`.
fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut s = OsString::from(path.as_os_str());
    s.push(suffix);
    PathBuf::from(s)
}

/// Re-emits the whole tree to the backing file using the rewrite protocol
/// above.
pub(crate) fn rewrite_dump(path: &Path, tree: &TreeStore) -> Result<(), BackendError> {
    let new_path = sibling(path, ".new");
    let old_path = sibling(path, ".old");

    if let Err(e) = write_new_file(&new_path, tree) {
        error!(
            alert = ALERT_TYPE_CANNOT_WRITE_UPDATE,
            path = %new_path.display(),
            "failed to write new dump file: {}",
            e
        );
        return Err(BackendError::ServerError(format!(
            "failed to write new dump file {}: {}",
            new_path.display(),
            e
        )));
    }

    if old_path.exists() {
        if let Err(e) = fs::remove_file(&old_path) {
            warn!(path = %old_path.display(), "could not remove previous dump: {}", e);
        }
    }

    if path.exists() {
        if let Err(e) = fs::rename(path, &old_path) {
            warn!(path = %path.display(), "could not park current dump: {}", e);
        }
    }

    if let Err(e) = fs::rename(&new_path, path) {
        error!(
            alert = ALERT_TYPE_CANNOT_WRITE_UPDATE,
            from = %new_path.display(),
            to = %path.display(),
            "failed to move new dump into place: {}",
            e
        );
        return Err(BackendError::ServerError(format!(
            "failed to rename {} to {}: {}",
            new_path.display(),
            path.display(),
            e
        )));
    }

    Ok(())
}

fn write_new_file(new_path: &Path, tree: &TreeStore) -> std::io::Result<()> {
    let file = File::create(new_path)?;
    let mut writer = LdifWriter::new(BufWriter::new(file));
    for entry in tree.iter() {
        writer
            .write_entry(entry)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?;
    }
    let mut out = writer.into_inner();
    out.flush()?;
    out.into_inner()
        .map_err(|e| e.into_error())?
        .sync_all()
}
