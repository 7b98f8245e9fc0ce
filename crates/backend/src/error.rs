//! Backend error type and its mapping to LDAP result codes.

use dn::Dn;
use thiserror::Error;
use tree::TreeError;

/// Failures surfaced by backend operations.
///
/// Each variant corresponds to one LDAP result code (see
/// [`result_code`](BackendError::result_code)); the matched-DN diagnostic
/// travels as structured data on `NoSuchObject`.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BackendError {
    /// The target entry or a required ancestor does not exist. `matched`
    /// is the deepest ancestor of the requested DN that does exist.
    #[error("no such entry: {dn}")]
    NoSuchObject { dn: Dn, matched: Option<Dn> },

    /// An add or rename target already exists.
    #[error("entry already exists: {0}")]
    EntryAlreadyExists(Dn),

    /// Delete of a non-leaf entry without the subtree delete control.
    #[error("entry {0} has subordinate entries")]
    NotAllowedOnNonleaf(Dn),

    /// The backend refuses the operation (shut down, cross-backend rename,
    /// backup/restore).
    #[error("unwilling to perform: {0}")]
    UnwillingToPerform(String),

    /// I/O failure in the dump writer or codec.
    #[error("server error: {0}")]
    ServerError(String),

    /// The backend configuration is not acceptable.
    #[error(transparent)]
    Config(#[from] crate::config::ConfigError),
}

impl BackendError {
    /// The LDAP result code for this failure.
    pub fn result_code(&self) -> u32 {
        match self {
            BackendError::NoSuchObject { .. } => 32,
            BackendError::EntryAlreadyExists(_) => 68,
            BackendError::NotAllowedOnNonleaf(_) => 66,
            BackendError::UnwillingToPerform(_) => 53,
            BackendError::ServerError(_) => 80,
            BackendError::Config(_) => 80,
        }
    }

    /// The matched-DN diagnostic, when this failure carries one.
    pub fn matched_dn(&self) -> Option<&Dn> {
        match self {
            BackendError::NoSuchObject { matched, .. } => matched.as_ref(),
            _ => None,
        }
    }
}

impl From<TreeError> for BackendError {
    fn from(e: TreeError) -> BackendError {
        match e {
            TreeError::NoSuchEntry { dn, matched } => BackendError::NoSuchObject { dn, matched },
            TreeError::AlreadyExists { dn } => BackendError::EntryAlreadyExists(dn),
            TreeError::NotAllowedOnNonLeaf { dn } => BackendError::NotAllowedOnNonleaf(dn),
        }
    }
}

impl From<ldif::LdifError> for BackendError {
    fn from(e: ldif::LdifError) -> BackendError {
        BackendError::ServerError(e.to_string())
    }
}
