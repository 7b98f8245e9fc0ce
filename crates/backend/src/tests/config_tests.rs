use super::helpers::*;
use crate::{BackendConfig, BackendError, LdifBackend};

#[test]
fn exactly_one_base_dn_is_required() {
    let dir = tempfile::tempdir().unwrap();

    let mut config = BackendConfig::new(dn("dc=x"), dir.path().join("dump.ldif"));
    config.base_dns.push(dn("dc=y"));

    assert!(!config.check_acceptable().is_empty());
    let err = LdifBackend::open(config).unwrap_err();
    assert!(matches!(err, BackendError::Config(_)));

    let mut config = BackendConfig::new(dn("dc=x"), dir.path().join("dump.ldif"));
    config.base_dns.clear();
    assert!(LdifBackend::open(config).is_err());
}

#[test]
fn acceptable_config_passes() {
    let dir = tempfile::tempdir().unwrap();
    let config = BackendConfig::new(dn("dc=x"), dir.path().join("dump.ldif"));
    assert!(config.check_acceptable().is_empty());
    assert!(config.validate().is_ok());
}

#[test]
fn changing_the_ldif_file_requires_admin_action() {
    let (dir, backend) = open_backend();

    let changed = BackendConfig::new(dn("dc=x"), dir.path().join("elsewhere.ldif"));
    let result = backend.apply_configuration_change(changed);

    assert!(result.admin_action_required);
    assert!(!result.messages.is_empty());
    // the running backend keeps using the path it was opened with
    assert!(backend.ldif_path().ends_with("dump.ldif"));
}

#[test]
fn changing_the_base_dn_requires_admin_action() {
    let (dir, backend) = open_backend();

    let changed = BackendConfig::new(dn("dc=y"), dir.path().join("dump.ldif"));
    let result = backend.apply_configuration_change(changed);

    assert!(result.admin_action_required);
    assert_eq!(backend.base_dn(), &dn("dc=x"));
}

#[test]
fn unrelated_changes_take_effect_immediately() {
    let (dir, backend) = open_backend();
    assert!(!backend.is_private_backend());

    let mut changed = BackendConfig::new(dn("dc=x"), dir.path().join("dump.ldif"));
    changed.is_private_backend = true;
    let result = backend.apply_configuration_change(changed);

    assert!(!result.admin_action_required);
    assert!(backend.is_private_backend());
}
