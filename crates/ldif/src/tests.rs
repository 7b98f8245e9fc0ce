use super::*;
use std::io::Cursor;

fn dn(s: &str) -> Dn {
    Dn::parse(s).unwrap()
}

fn sample_entry() -> Entry {
    let mut e = Entry::new(dn("ou=People,dc=example,dc=com"));
    e.put("objectClass", &b"top"[..]);
    e.put("objectClass", &b"organizationalUnit"[..]);
    e.put("ou", &b"People"[..]);
    e
}

fn write_to_string(entries: &[Entry], wrap: usize) -> String {
    let mut w = LdifWriter::new(Vec::new()).with_wrap_column(wrap);
    for e in entries {
        w.write_entry(e).unwrap();
    }
    String::from_utf8(w.into_inner()).unwrap()
}

fn read_all(text: &str) -> (Vec<Entry>, u64, u64) {
    let mut r = LdifReader::new(Cursor::new(text.to_string()));
    let mut out = Vec::new();
    loop {
        match r.read_entry() {
            Ok(Some(e)) => out.push(e),
            Ok(None) => break,
            Err(e) if e.can_continue() => continue,
            Err(e) => panic!("unrecoverable: {}", e),
        }
    }
    (out, r.entries_read(), r.entries_rejected())
}

// --------------------- writer ---------------------

#[test]
fn writes_simple_record() {
    let text = write_to_string(&[sample_entry()], 0);
    assert_eq!(
        text,
        "dn: ou=People,dc=example,dc=com\n\
         objectClass: top\n\
         objectClass: organizationalUnit\n\
         ou: People\n\n"
    );
}

#[test]
fn base64_encodes_unsafe_values() {
    let mut e = Entry::new(dn("cn=x,dc=x"));
    e.put("description", &b" leading space"[..]);
    e.put("data", &[0u8, 1, 2][..]);
    let text = write_to_string(&[e], 0);
    assert!(text.contains("description:: "));
    assert!(text.contains("data:: AAEC"));
}

#[test]
fn wraps_long_lines_with_continuation_marker() {
    let mut e = Entry::new(dn("cn=x,dc=x"));
    e.put("description", "a".repeat(100).into_bytes());
    let text = write_to_string(&[e], 20);

    for line in text.lines() {
        assert!(line.len() <= 20, "line too long: {:?}", line);
    }
    // folded lines resume with exactly one space
    assert!(text.lines().filter(|l| l.starts_with(' ')).count() > 3);
}

// --------------------- reader ---------------------

#[test]
fn round_trip_preserves_entries() {
    let mut with_binary = Entry::new(dn("cn=bin,dc=example,dc=com"));
    with_binary.put("objectClass", &b"top"[..]);
    with_binary.put("data", &[0u8, 255, 7][..]);

    let entries = vec![sample_entry(), with_binary];
    for wrap in [0, 12, 40, 78] {
        let text = write_to_string(&entries, wrap);
        let (read, n_read, n_rejected) = read_all(&text);
        assert_eq!(read, entries, "wrap={}", wrap);
        assert_eq!(n_read, 2);
        assert_eq!(n_rejected, 0);
    }
}

#[test]
fn accepts_comments_version_and_extra_blank_lines() {
    let text = "version: 1\n\
                # a comment\n\
                #  folded across\n\
                \n\
                \n\
                dn: dc=x\n\
                # comment inside record\n\
                dc: x\n\
                \n\
                \n";
    let (entries, n_read, _) = read_all(text);
    assert_eq!(entries.len(), 1);
    assert_eq!(n_read, 1);
    assert_eq!(entries[0].dn(), &dn("dc=x"));
    assert_eq!(entries[0].first_value("dc").unwrap(), b"x");
}

#[test]
fn unfolds_any_wrap_column() {
    let text = "dn: cn=wr\n apped,dc=x\ncn: wr\n apped\n\n";
    let (entries, _, _) = read_all(text);
    assert_eq!(entries[0].dn(), &dn("cn=wrapped,dc=x"));
    assert_eq!(entries[0].first_value("cn").unwrap(), b"wrapped");
}

#[test]
fn malformed_record_is_recoverable() {
    let text = "dn: cn=ok,dc=x\ncn: ok\n\n\
                not an attribute line\ncn: broken\n\n\
                dn: cn=ok2,dc=x\ncn: ok2\n\n";
    let mut r = LdifReader::new(Cursor::new(text.to_string()));

    assert!(r.read_entry().unwrap().is_some());

    let err = r.read_entry().unwrap_err();
    assert!(err.can_continue(), "expected recoverable error: {}", err);

    // the bad record was consumed; the next read yields the third record
    let third = r.read_entry().unwrap().unwrap();
    assert_eq!(third.dn(), &dn("cn=ok2,dc=x"));
    assert!(r.read_entry().unwrap().is_none());

    assert_eq!(r.entries_read(), 2);
    assert_eq!(r.entries_rejected(), 1);
}

#[test]
fn record_must_start_with_dn() {
    let text = "cn: nope\n\n";
    let mut r = LdifReader::new(Cursor::new(text.to_string()));
    let err = r.read_entry().unwrap_err();
    assert!(err.can_continue());
    assert_eq!(r.entries_rejected(), 1);
}

#[test]
fn bad_base64_rejects_the_record() {
    let text = "dn: cn=a,dc=x\ncn:: !!!not-base64!!!\n\n";
    let (entries, n_read, n_rejected) = read_all(text);
    assert!(entries.is_empty());
    assert_eq!(n_read, 0);
    assert_eq!(n_rejected, 1);
}

#[test]
fn reject_last_entry_counts() {
    let text = "dn: dc=x\ndc: x\n\n";
    let mut r = LdifReader::new(Cursor::new(text.to_string()));
    r.read_entry().unwrap().unwrap();
    r.reject_last_entry();
    assert_eq!(r.entries_read(), 1);
    assert_eq!(r.entries_rejected(), 1);
}

#[test]
fn empty_input_yields_no_entries() {
    let (entries, n_read, _) = read_all("");
    assert!(entries.is_empty());
    assert_eq!(n_read, 0);

    let (entries, _, _) = read_all("\n\n# only comments\n\n");
    assert!(entries.is_empty());
}

#[test]
fn open_reads_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("dump.ldif");
    std::fs::write(&path, write_to_string(&[sample_entry()], 0)).unwrap();

    let mut r = LdifReader::open(&path).unwrap();
    let e = r.read_entry().unwrap().unwrap();
    assert_eq!(e, sample_entry());
}
