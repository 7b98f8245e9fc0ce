//! # Backend - LDIF-backed directory backend
//!
//! The facade that ties the [`tree`] store, the [`ldif`] codec and the
//! atomic dump rewriter into a complete directory backend: the whole tree
//! lives in memory, every read is served from memory, and every write
//! re-emits the backing LDIF file before it returns.
//!
//! ## Architecture
//!
//! ```text
//! Caller
//!   |
//!   v
//! ┌───────────────────────────────────────────────┐
//! │                LDIF BACKEND                   │
//! │                                               │
//! │ write.rs → RwLock(write) → TreeStore mutation │
//! │              |                                │
//! │              v                                │
//! │           writer.rs → P.new → rename → P      │
//! │                                               │
//! │ read.rs  → RwLock(read)  → TreeStore lookup   │
//! │             (deep copies out, linear search)  │
//! │                                               │
//! │ import.rs → clear + reload + per-record checks│
//! └───────────────────────────────────────────────┘
//! ```
//!
//! ## Module Responsibilities
//!
//! | Module        | Purpose                                              |
//! |---------------|------------------------------------------------------|
//! | `lib.rs`      | `LdifBackend` struct, startup load, accessors, Debug |
//! | [`config`]    | backend configuration and change handling            |
//! | [`error`]     | `BackendError` with the LDAP result-code mapping     |
//! | [`read`]      | lookups, counts, search, export                      |
//! | [`write`]     | add / delete / replace / rename                      |
//! | [`import`]    | bulk loader shared by startup and import             |
//! | [`writer`]    | atomic rewrite of the backing dump file              |
//!
//! ## Locking
//!
//! One `parking_lot::RwLock` guards the entire store. Read operations hold
//! the read side; mutations hold the write side across both the in-memory
//! change and the file rewrite, so no lock acquirer can ever observe a tree
//! that disagrees with the dump on disk. Returned entries are deep copies
//! and outlive the lock.

mod config;
mod error;
mod import;
mod read;
mod write;
mod writer;

use std::path::{Path, PathBuf};

use dn::Dn;
use ldif::LdifReader;
use parking_lot::{Mutex, RwLock};
use tracing::debug;
use tree::TreeStore;

pub use config::{BackendConfig, ConfigChangeResult, ConfigError};
pub use error::BackendError;
pub use import::ImportResult;
pub use tree::SearchScope;
pub use writer::ALERT_TYPE_CANNOT_WRITE_UPDATE;

/// OID of the subtree delete request control.
pub const OID_SUBTREE_DELETE_CONTROL: &str = "1.2.840.113556.1.4.805";

/// A request control attached to an operation by the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Control {
    pub oid: String,
    pub critical: bool,
}

impl Control {
    /// Builds a non-critical control with the given OID.
    pub fn new(oid: impl Into<String>) -> Control {
        Control {
            oid: oid.into(),
            critical: false,
        }
    }

    /// The subtree delete control.
    pub fn subtree_delete() -> Control {
        Control::new(OID_SUBTREE_DELETE_CONTROL)
    }
}

/// Guarded state: the tree plus the accepting-operations flag, so both flip
/// together under the one lock.
struct BackendState {
    tree: TreeStore,
    closed: bool,
}

/// A backend that keeps the whole directory tree in memory and re-writes a
/// single LDIF dump file on every mutation.
pub struct LdifBackend {
    base_dn: Dn,
    ldif_path: PathBuf,
    state: RwLock<BackendState>,
    config: Mutex<BackendConfig>,
}

impl LdifBackend {
    /// Opens the backend: validates the configuration and loads the dump
    /// file. A missing file is fine — the backend starts empty and the
    /// file appears on the first mutation.
    pub fn open(config: BackendConfig) -> Result<LdifBackend, BackendError> {
        config.validate()?;
        let base_dn = config.base_dns[0].clone();
        let ldif_path = config.ldif_file.clone();

        let mut tree = TreeStore::new(base_dn.clone());
        if ldif_path.exists() {
            let reader = LdifReader::open(&ldif_path)?;
            // startup load: the file is authoritative, so no rewrite
            let result = import::load_into(&mut tree, reader, None)?;
            debug!(
                path = %ldif_path.display(),
                read = result.entries_read,
                rejected = result.entries_rejected,
                "loaded backing file"
            );
        } else {
            debug!(
                path = %ldif_path.display(),
                "backing file does not exist, starting empty"
            );
        }

        Ok(LdifBackend {
            base_dn,
            ldif_path,
            state: RwLock::new(BackendState {
                tree,
                closed: false,
            }),
            config: Mutex::new(config),
        })
    }

    /// The single base DN this backend is registered for.
    pub fn base_dn(&self) -> &Dn {
        &self.base_dn
    }

    /// Path of the backing dump file.
    pub fn ldif_path(&self) -> &Path {
        &self.ldif_path
    }

    /// Whether the base DN should be registered as private.
    pub fn is_private_backend(&self) -> bool {
        self.config.lock().is_private_backend
    }

    /// True when the given DN falls under this backend's base DN.
    pub fn handles_entry(&self, dn: &Dn) -> bool {
        dn == &self.base_dn || dn.is_descendant_of(&self.base_dn)
    }

    /// OIDs of the request controls this backend understands.
    pub fn supported_controls() -> &'static [&'static str] {
        &[OID_SUBTREE_DELETE_CONTROL]
    }

    /// OIDs of the extended features this backend supports (none).
    pub fn supported_features() -> &'static [&'static str] {
        &[]
    }

    /// Alert types this backend can raise, with their descriptions.
    pub fn alerts() -> &'static [(&'static str, &'static str)] {
        &[(
            ALERT_TYPE_CANNOT_WRITE_UPDATE,
            "the backend was unable to rewrite its backing LDIF file; \
             the on-disk copy no longer reflects the in-memory tree",
        )]
    }

    /// This backend has no backup mechanism.
    pub fn create_backup(&self) -> Result<(), BackendError> {
        Err(BackendError::UnwillingToPerform(
            "this backend does not provide a backup mechanism".to_string(),
        ))
    }

    /// This backend has no restore mechanism.
    pub fn restore_backup(&self) -> Result<(), BackendError> {
        Err(BackendError::UnwillingToPerform(
            "this backend does not provide a restore mechanism".to_string(),
        ))
    }

    /// Stops accepting operations. Takes the write lock, so in-flight
    /// callers finish first; everything after fails `UnwillingToPerform`.
    pub fn shut_down(&self) {
        let mut state = self.state.write();
        state.closed = true;
    }

    fn check_open(state: &BackendState) -> Result<(), BackendError> {
        if state.closed {
            Err(BackendError::UnwillingToPerform(
                "backend has been shut down".to_string(),
            ))
        } else {
            Ok(())
        }
    }
}

impl std::fmt::Debug for LdifBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read();
        f.debug_struct("LdifBackend")
            .field("base_dn", &self.base_dn.to_string())
            .field("ldif_path", &self.ldif_path)
            .field("entries", &state.tree.len())
            .field("closed", &state.closed)
            .finish()
    }
}

#[cfg(test)]
mod tests;
