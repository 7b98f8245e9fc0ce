use std::io::Cursor;

use super::helpers::*;
use crate::BackendError;
use ldif::LdifReader;

fn reader(text: &str) -> LdifReader<Cursor<Vec<u8>>> {
    LdifReader::new(Cursor::new(text.as_bytes().to_vec()))
}

#[test]
fn import_replaces_existing_contents() {
    let (_dir, backend) = small_backend();

    let text = "dn: dc=x\ndc: x\n\ndn: ou=fresh,dc=x\nou: fresh\n\n";
    let result = backend.import_ldif(reader(text)).unwrap();

    assert_eq!(result.entries_read, 2);
    assert_eq!(result.entries_rejected, 0);
    assert_eq!(backend.entry_count(), 2);
    assert!(backend.entry_exists(&dn("ou=fresh,dc=x")).unwrap());
    assert!(!backend.entry_exists(&dn("ou=p,dc=x")).unwrap());

    // a mutation-driven import rewrites the dump
    assert_eq!(records_on_disk(backend.ldif_path()), 2);
}

#[test]
fn duplicate_record_is_rejected_and_counted() {
    let (_dir, backend) = open_backend();

    let text = "dn: dc=x\ndc: x\n\n\
                dn: cn=a,dc=x\ncn: a\ndescription: first\n\n\
                dn: cn=a,dc=x\ncn: a\ndescription: second\n\n";
    let result = backend.import_ldif(reader(text)).unwrap();

    assert_eq!(result.entries_read, 3);
    assert_eq!(result.entries_rejected, 1);
    assert_eq!(backend.entry_count(), 2);

    // the first record wins
    let kept = backend.get_entry(&dn("cn=a,dc=x")).unwrap().unwrap();
    assert_eq!(kept.first_value("description").unwrap(), b"first");
}

#[test]
fn out_of_scope_and_orphan_records_are_rejected() {
    let (_dir, backend) = open_backend();

    let text = "dn: dc=x\ndc: x\n\n\
                dn: dc=elsewhere\ndc: elsewhere\n\n\
                dn: cn=orphan,ou=missing,dc=x\ncn: orphan\n\n";
    let result = backend.import_ldif(reader(text)).unwrap();

    assert_eq!(result.entries_read, 3);
    assert_eq!(result.entries_rejected, 2);
    assert_eq!(backend.entry_count(), 1);
}

#[test]
fn recoverable_parse_errors_are_skipped() {
    let (_dir, backend) = open_backend();

    let text = "dn: dc=x\ndc: x\n\n\
                garbage without a separator\n\n\
                dn: ou=p,dc=x\nou: p\n\n";
    let result = backend.import_ldif(reader(text)).unwrap();

    assert_eq!(result.entries_read, 2);
    assert_eq!(result.entries_rejected, 1);
    assert_eq!(backend.entry_count(), 2);
}

#[test]
fn suffix_record_is_admitted_unconditionally() {
    let (_dir, backend) = open_backend();

    // no parent chain above the suffix is ever required
    let text = "dn: dc=x\ndc: x\n\n";
    let result = backend.import_ldif(reader(text)).unwrap();
    assert_eq!(result.entries_read, 1);
    assert!(backend.entry_exists(&dn("dc=x")).unwrap());
}

#[test]
fn records_must_arrive_parents_first() {
    let (_dir, backend) = open_backend();

    let text = "dn: dc=x\ndc: x\n\n\
                dn: cn=a,ou=p,dc=x\ncn: a\n\n\
                dn: ou=p,dc=x\nou: p\n\n";
    let result = backend.import_ldif(reader(text)).unwrap();

    // the child arrived before its parent and was rejected
    assert_eq!(result.entries_rejected, 1);
    assert!(backend.entry_exists(&dn("ou=p,dc=x")).unwrap());
    assert!(!backend.entry_exists(&dn("cn=a,ou=p,dc=x")).unwrap());
}

#[test]
fn import_then_export_round_trips() {
    let (_dir, backend) = open_backend();

    let text = "dn: dc=x\ndc: x\n\n\
                dn: ou=p,dc=x\nou: p\n\n\
                dn: cn=a,ou=p,dc=x\ncn: a\nsn: alpha\n\n";
    backend.import_ldif(reader(text)).unwrap();

    let mut w = ldif::LdifWriter::new(Vec::new());
    backend.export_ldif(&mut w).unwrap();
    let exported = String::from_utf8(w.into_inner()).unwrap();

    let (_dir2, second) = open_backend();
    let result = second.import_ldif(reader(&exported)).unwrap();
    assert_eq!(result.entries_read, 3);
    assert_eq!(result.entries_rejected, 0);
    assert_eq!(second.entry_count(), 3);
}

#[test]
fn startup_load_reads_the_dump_without_rewriting_it() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("dump.ldif");
    std::fs::write(&path, "dn: dc=x\ndc: x\n\ndn: ou=p,dc=x\nou: p\n\n").unwrap();
    let mtime = std::fs::metadata(&path).unwrap().modified().unwrap();

    let config = crate::BackendConfig::new(dn("dc=x"), &path);
    let backend = crate::LdifBackend::open(config).unwrap();

    assert_eq!(backend.entry_count(), 2);
    // the file is authoritative at startup; it must not be rewritten
    assert_eq!(std::fs::metadata(&path).unwrap().modified().unwrap(), mtime);
}

#[test]
fn import_into_shut_down_backend_is_refused() {
    let (_dir, backend) = open_backend();
    backend.shut_down();
    let err = backend.import_ldif(reader("dn: dc=x\ndc: x\n\n")).unwrap_err();
    assert!(matches!(err, BackendError::UnwillingToPerform(_)));
}
