//! Backend configuration and reconfiguration handling.
//!
//! The backend takes its base DN and backing file path from a
//! [`BackendConfig`]. Exactly one base DN is required; that is checked both
//! up front ([`BackendConfig::validate`]) and at the configuration-change
//! acceptability stage. Changing the base DN or the dump file path of a
//! running backend is refused in the sense that the new values take effect
//! only after an administrative restart.

use std::path::PathBuf;

use dn::Dn;
use thiserror::Error;

use crate::LdifBackend;

/// A rejected configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("exactly one base DN is required, got {0}")]
    BaseDnCount(usize),
}

/// Configuration for an [`LdifBackend`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendConfig {
    /// Base DNs to register. The backend supports exactly one.
    pub base_dns: Vec<Dn>,
    /// Path of the backing LDIF dump file.
    pub ldif_file: PathBuf,
    /// Register the base DN as a private (non user-visible) suffix.
    pub is_private_backend: bool,
}

impl BackendConfig {
    /// Builds a configuration with a single base DN.
    pub fn new(base_dn: Dn, ldif_file: impl Into<PathBuf>) -> BackendConfig {
        BackendConfig {
            base_dns: vec![base_dn],
            ldif_file: ldif_file.into(),
            is_private_backend: false,
        }
    }

    /// Checks the hard requirements.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.base_dns.len() != 1 {
            return Err(ConfigError::BaseDnCount(self.base_dns.len()));
        }
        Ok(())
    }

    /// Reasons why this configuration would be rejected, empty when
    /// acceptable. Mirrors `validate` but collects instead of failing fast.
    pub fn check_acceptable(&self) -> Vec<String> {
        let mut reasons = Vec::new();
        if self.base_dns.len() != 1 {
            reasons.push(format!(
                "exactly one base DN is required, got {}",
                self.base_dns.len()
            ));
        }
        reasons
    }
}

/// Outcome of applying a configuration change to a running backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigChangeResult {
    /// True when the change only takes effect after a restart.
    pub admin_action_required: bool,
    pub messages: Vec<String>,
}

impl LdifBackend {
    /// Whether `new` would be accepted; non-empty reasons mean no.
    pub fn is_configuration_change_acceptable(&self, new: &BackendConfig) -> Vec<String> {
        new.check_acceptable()
    }

    /// Applies a configuration change. Base-DN and dump-file changes are
    /// recorded but require admin action (a restart) to take effect; the
    /// rest takes effect immediately.
    pub fn apply_configuration_change(&self, new: BackendConfig) -> ConfigChangeResult {
        let mut messages = Vec::new();
        let mut admin_action_required = false;

        let mut current = self.config.lock();
        if new.ldif_file != current.ldif_file {
            messages.push(
                "the LDIF file path has changed; the new path will be used the next time \
                 the backend is started"
                    .to_string(),
            );
            admin_action_required = true;
        }
        if new.base_dns != current.base_dns {
            messages.push(
                "the base DN has changed; the new base DN will be used the next time \
                 the backend is started"
                    .to_string(),
            );
            admin_action_required = true;
        }
        *current = new;

        ConfigChangeResult {
            admin_action_required,
            messages,
        }
    }
}
