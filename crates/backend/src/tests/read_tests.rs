use super::helpers::*;
use crate::{BackendError, SearchScope};
use entry::Filter;

#[test]
fn get_entry_returns_deep_copies() {
    let (_dir, backend) = small_backend();

    let mut copy = backend.get_entry(&dn("dc=x")).unwrap().unwrap();
    copy.put("description", &b"mutated"[..]);

    let again = backend.get_entry(&dn("dc=x")).unwrap().unwrap();
    assert!(!again.has_attribute("description"));
}

#[test]
fn counts_and_subordinates() {
    let (_dir, backend) = small_backend();

    assert_eq!(backend.entry_count(), 3);
    assert!(backend.has_subordinates(&dn("dc=x")).unwrap());
    assert!(!backend.has_subordinates(&dn("cn=a,ou=p,dc=x")).unwrap());
    assert_eq!(backend.num_subordinates(&dn("dc=x"), false).unwrap(), 1);
    assert_eq!(backend.num_subordinates(&dn("dc=x"), true).unwrap(), 2);

    let err = backend.num_subordinates(&dn("cn=ghost,dc=x"), false).unwrap_err();
    assert!(matches!(err, BackendError::NoSuchObject { .. }));
}

#[test]
fn search_whole_subtree_from_base() {
    let (_dir, backend) = small_backend();

    let mut dns = Vec::new();
    backend
        .search(
            &dn("dc=x"),
            SearchScope::WholeSubtree,
            &Filter::match_all(),
            |e| dns.push(e.dn().clone()),
        )
        .unwrap();
    assert_eq!(dns.len(), 3);
}

#[test]
fn search_with_filter_and_scope() {
    let (_dir, backend) = small_backend();

    let mut dns = Vec::new();
    backend
        .search(
            &dn("dc=x"),
            SearchScope::SingleLevel,
            &Filter::parse("(ou=*)").unwrap(),
            |e| dns.push(e.dn().clone()),
        )
        .unwrap();
    assert_eq!(dns, vec![dn("ou=p,dc=x")]);
}

#[test]
fn search_missing_base_carries_matched_dn() {
    let (_dir, backend) = small_backend();

    let err = backend
        .search(
            &dn("cn=z,ou=p,dc=x"),
            SearchScope::BaseObject,
            &Filter::match_all(),
            |_| {},
        )
        .unwrap_err();
    assert_eq!(err.matched_dn(), Some(&dn("ou=p,dc=x")));
    assert_eq!(err.result_code(), 32);
}

#[test]
fn export_writes_parents_before_children() {
    let (_dir, backend) = small_backend();

    let mut w = ldif::LdifWriter::new(Vec::new());
    backend.export_ldif(&mut w).unwrap();
    let text = String::from_utf8(w.into_inner()).unwrap();

    let base = text.find("dn: dc=x").unwrap();
    let ou = text.find("dn: ou=p,dc=x").unwrap();
    let cn = text.find("dn: cn=a,ou=p,dc=x").unwrap();
    assert!(base < ou && ou < cn);
}

#[test]
fn backup_and_restore_are_unwilling() {
    let (_dir, backend) = open_backend();
    assert_eq!(backend.create_backup().unwrap_err().result_code(), 53);
    assert_eq!(backend.restore_backup().unwrap_err().result_code(), 53);
}

#[test]
fn supported_controls_lists_subtree_delete() {
    assert_eq!(
        crate::LdifBackend::supported_controls(),
        &[crate::OID_SUBTREE_DELETE_CONTROL]
    );
    assert!(crate::LdifBackend::supported_features().is_empty());
    assert!(!crate::LdifBackend::alerts().is_empty());
}
