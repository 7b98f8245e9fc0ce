use std::path::Path;

use dn::Dn;
use entry::Entry;
use tempfile::TempDir;

use crate::{BackendConfig, LdifBackend};

pub fn dn(s: &str) -> Dn {
    Dn::parse(s).unwrap()
}

/// An entry whose RDN attribute is populated from its DN.
pub fn entry(s: &str) -> Entry {
    let mut e = Entry::new(dn(s));
    if let Some(rdn) = e.dn().rdn() {
        let attr = rdn.attr().to_string();
        let value = rdn.value().as_bytes().to_vec();
        e.put(&attr, value);
    }
    e
}

/// Backend rooted at dc=x over a dump file in a fresh temp dir.
pub fn open_backend() -> (TempDir, LdifBackend) {
    let dir = tempfile::tempdir().unwrap();
    let config = BackendConfig::new(dn("dc=x"), dir.path().join("dump.ldif"));
    let backend = LdifBackend::open(config).unwrap();
    (dir, backend)
}

/// Backend prepopulated with dc=x / ou=p,dc=x / cn=a,ou=p,dc=x.
pub fn small_backend() -> (TempDir, LdifBackend) {
    let (dir, backend) = open_backend();
    backend.add_entry(&entry("dc=x")).unwrap();
    backend.add_entry(&entry("ou=p,dc=x")).unwrap();
    backend.add_entry(&entry("cn=a,ou=p,dc=x")).unwrap();
    (dir, backend)
}

/// Number of records in an LDIF file, counted by dn lines.
pub fn records_on_disk(path: &Path) -> usize {
    let text = std::fs::read_to_string(path).unwrap();
    text.lines().filter(|l| l.starts_with("dn:")).count()
}
