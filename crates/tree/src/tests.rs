use super::*;

fn dn(s: &str) -> Dn {
    Dn::parse(s).unwrap()
}

fn entry(s: &str) -> Entry {
    let mut e = Entry::new(dn(s));
    if let Some(rdn) = e.dn().rdn() {
        let value = rdn.value().as_bytes().to_vec();
        let attr = rdn.attr().to_string();
        e.put(&attr, value);
    }
    e
}

/// Store prepopulated with dc=x / ou=p,dc=x / cn=a,ou=p,dc=x.
fn small_tree() -> TreeStore {
    let mut t = TreeStore::new(dn("dc=x"));
    t.add(&entry("dc=x")).unwrap();
    t.add(&entry("ou=p,dc=x")).unwrap();
    t.add(&entry("cn=a,ou=p,dc=x")).unwrap();
    t.check_invariants();
    t
}

fn collect(t: &TreeStore, base: &str, scope: SearchScope, filter: &str) -> Vec<Dn> {
    let mut out = Vec::new();
    t.search(&dn(base), scope, &Filter::parse(filter).unwrap(), |e| {
        out.push(e.dn().clone())
    })
    .unwrap();
    out.sort();
    out
}

// --------------------- add ---------------------

#[test]
fn first_add_bootstraps_the_suffix() {
    let mut t = TreeStore::new(dn("dc=x"));
    assert!(t.is_empty());

    t.add(&entry("dc=x")).unwrap();
    assert_eq!(t.len(), 1);
    assert!(t.exists(&dn("dc=x")));
    t.check_invariants();
}

#[test]
fn add_requires_existing_parent() {
    let mut t = TreeStore::new(dn("dc=x"));
    t.add(&entry("dc=x")).unwrap();

    let err = t.add(&entry("cn=a,ou=p,dc=x")).unwrap_err();
    assert_eq!(
        err,
        TreeError::NoSuchEntry {
            dn: dn("cn=a,ou=p,dc=x"),
            matched: Some(dn("dc=x")),
        }
    );
    assert_eq!(t.len(), 1);
    t.check_invariants();
}

#[test]
fn add_duplicate_is_rejected() {
    let mut t = small_tree();
    let err = t.add(&entry("ou=p,dc=x")).unwrap_err();
    assert_eq!(err, TreeError::AlreadyExists { dn: dn("ou=p,dc=x") });
}

#[test]
fn add_outside_suffix_is_rejected() {
    let mut t = small_tree();
    let err = t.add(&entry("cn=a,dc=other")).unwrap_err();
    assert_eq!(
        err,
        TreeError::NoSuchEntry {
            dn: dn("cn=a,dc=other"),
            matched: None,
        }
    );
}

// --------------------- get / exists / counts ---------------------

#[test]
fn get_entry_returns_an_independent_copy() {
    let t = small_tree();
    let mut copy = t.get_entry(&dn("cn=a,ou=p,dc=x")).unwrap();
    copy.put("description", &b"mutated"[..]);

    let again = t.get_entry(&dn("cn=a,ou=p,dc=x")).unwrap();
    assert!(!again.has_attribute("description"));
}

#[test]
fn has_children_is_tri_state() {
    let t = small_tree();
    assert!(t.has_children(&dn("ou=p,dc=x")).unwrap());
    assert!(!t.has_children(&dn("cn=a,ou=p,dc=x")).unwrap());
    assert!(matches!(
        t.has_children(&dn("cn=ghost,dc=x")),
        Err(TreeError::NoSuchEntry { .. })
    ));
}

#[test]
fn count_subordinates_direct_and_subtree() {
    let mut t = small_tree();
    t.add(&entry("cn=b,ou=p,dc=x")).unwrap();

    assert_eq!(t.count_subordinates(&dn("dc=x"), false).unwrap(), 1);
    assert_eq!(t.count_subordinates(&dn("dc=x"), true).unwrap(), 3);
    assert_eq!(t.count_subordinates(&dn("ou=p,dc=x"), true).unwrap(), 2);
    assert_eq!(
        t.count_subordinates(&dn("cn=a,ou=p,dc=x"), true).unwrap(),
        0
    );
    assert!(t.count_subordinates(&dn("cn=nope,dc=x"), false).is_err());
}

// --------------------- delete ---------------------

#[test]
fn delete_missing_entry_reports_matched_dn() {
    let mut t = small_tree();
    let err = t.delete(&dn("cn=z,ou=p,dc=x"), false).unwrap_err();
    assert_eq!(
        err,
        TreeError::NoSuchEntry {
            dn: dn("cn=z,ou=p,dc=x"),
            matched: Some(dn("ou=p,dc=x")),
        }
    );
}

#[test]
fn delete_leaf_prunes_empty_child_set() {
    let mut t = small_tree();
    t.delete(&dn("cn=a,ou=p,dc=x"), false).unwrap();

    assert!(!t.exists(&dn("cn=a,ou=p,dc=x")));
    assert!(!t.has_children(&dn("ou=p,dc=x")).unwrap());
    t.check_invariants();
}

#[test]
fn delete_nonleaf_requires_subtree() {
    let mut t = small_tree();
    let err = t.delete(&dn("dc=x"), false).unwrap_err();
    assert_eq!(err, TreeError::NotAllowedOnNonLeaf { dn: dn("dc=x") });
    assert_eq!(t.len(), 3);

    t.delete(&dn("dc=x"), true).unwrap();
    assert!(t.is_empty());
    t.check_invariants();
}

#[test]
fn subtree_delete_removes_every_descendant() {
    let mut t = small_tree();
    t.add(&entry("ou=q,dc=x")).unwrap();
    t.add(&entry("cn=b,ou=q,dc=x")).unwrap();

    t.delete(&dn("ou=p,dc=x"), true).unwrap();

    assert!(!t.exists(&dn("ou=p,dc=x")));
    assert!(!t.exists(&dn("cn=a,ou=p,dc=x")));
    assert!(t.exists(&dn("cn=b,ou=q,dc=x")));
    assert_eq!(t.len(), 3);
    t.check_invariants();
}

// --------------------- replace ---------------------

#[test]
fn replace_swaps_the_stored_entry() {
    let mut t = small_tree();
    let mut e = entry("cn=a,ou=p,dc=x");
    e.put("description", &b"updated"[..]);
    t.replace(&e).unwrap();

    let got = t.get_entry(&dn("cn=a,ou=p,dc=x")).unwrap();
    assert_eq!(got.first_value("description").unwrap(), b"updated");
    t.check_invariants();
}

#[test]
fn replace_missing_entry_fails() {
    let mut t = small_tree();
    let err = t.replace(&entry("cn=nope,dc=x")).unwrap_err();
    assert_eq!(
        err,
        TreeError::NoSuchEntry {
            dn: dn("cn=nope,dc=x"),
            matched: Some(dn("dc=x")),
        }
    );
}

// --------------------- rename ---------------------

#[test]
fn rename_rekeys_the_whole_subtree() {
    let mut t = small_tree();
    t.rename(&dn("ou=p,dc=x"), &entry("ou=q,dc=x"), false).unwrap();

    assert!(!t.exists(&dn("ou=p,dc=x")));
    assert!(!t.exists(&dn("cn=a,ou=p,dc=x")));
    assert!(t.exists(&dn("ou=q,dc=x")));
    assert!(t.exists(&dn("cn=a,ou=q,dc=x")));
    assert_eq!(t.len(), 3);

    // re-keyed descendants keep their attributes and their new DN
    let moved = t.get_entry(&dn("cn=a,ou=q,dc=x")).unwrap();
    assert_eq!(moved.dn(), &dn("cn=a,ou=q,dc=x"));
    assert_eq!(moved.first_value("cn").unwrap(), b"a");

    assert_eq!(t.count_subordinates(&dn("dc=x"), false).unwrap(), 1);
    assert_eq!(t.count_subordinates(&dn("ou=q,dc=x"), false).unwrap(), 1);
    t.check_invariants();
}

#[test]
fn rename_to_new_superior_moves_the_branch() {
    let mut t = small_tree();
    t.add(&entry("ou=q,dc=x")).unwrap();

    t.rename(&dn("cn=a,ou=p,dc=x"), &entry("cn=a,ou=q,dc=x"), true)
        .unwrap();

    assert!(t.exists(&dn("cn=a,ou=q,dc=x")));
    assert!(!t.exists(&dn("cn=a,ou=p,dc=x")));
    // the emptied old parent set is pruned when a new superior was named
    assert!(!t.has_children(&dn("ou=p,dc=x")).unwrap());
    t.check_invariants();
}

#[test]
fn rename_target_collision_is_rejected() {
    let mut t = small_tree();
    t.add(&entry("ou=q,dc=x")).unwrap();
    let err = t
        .rename(&dn("ou=p,dc=x"), &entry("ou=q,dc=x"), false)
        .unwrap_err();
    assert_eq!(err, TreeError::AlreadyExists { dn: dn("ou=q,dc=x") });
}

#[test]
fn rename_requires_new_parent() {
    let mut t = small_tree();
    let err = t
        .rename(&dn("cn=a,ou=p,dc=x"), &entry("cn=a,ou=missing,dc=x"), true)
        .unwrap_err();
    assert!(matches!(err, TreeError::NoSuchEntry { .. }));
}

#[test]
fn rename_missing_source_reports_matched_dn() {
    let mut t = small_tree();
    let err = t
        .rename(&dn("cn=ghost,ou=p,dc=x"), &entry("cn=g,dc=x"), false)
        .unwrap_err();
    assert_eq!(
        err,
        TreeError::NoSuchEntry {
            dn: dn("cn=ghost,ou=p,dc=x"),
            matched: Some(dn("ou=p,dc=x")),
        }
    );
}

#[test]
fn deep_subtree_rename_preserves_relative_components() {
    let mut t = small_tree();
    t.add(&entry("ou=inner,cn=a,ou=p,dc=x")).unwrap();
    t.add(&entry("cn=deep,ou=inner,cn=a,ou=p,dc=x")).unwrap();

    t.rename(&dn("ou=p,dc=x"), &entry("ou=r,dc=x"), false).unwrap();

    assert!(t.exists(&dn("cn=deep,ou=inner,cn=a,ou=r,dc=x")));
    assert_eq!(t.count_subordinates(&dn("ou=r,dc=x"), true).unwrap(), 3);
    t.check_invariants();
}

// --------------------- search ---------------------

#[test]
fn search_base_object_yields_only_the_base() {
    let t = small_tree();
    let got = collect(&t, "ou=p,dc=x", SearchScope::BaseObject, "(objectclass=*)");
    assert!(got.is_empty()); // entries in this fixture have no objectClass

    let got = collect(&t, "ou=p,dc=x", SearchScope::BaseObject, "(ou=p)");
    assert_eq!(got, vec![dn("ou=p,dc=x")]);
}

#[test]
fn search_scopes_partition_the_tree() {
    let mut t = small_tree();
    t.add(&entry("ou=q,dc=x")).unwrap();

    let all = Filter::match_all();
    let mut whole = Vec::new();
    t.search(&dn("dc=x"), SearchScope::WholeSubtree, &all, |e| {
        whole.push(e.dn().clone())
    })
    .unwrap();
    assert_eq!(whole.len(), 4);

    let single = collect(&t, "dc=x", SearchScope::SingleLevel, "(&)");
    assert_eq!(single, vec![dn("ou=p,dc=x"), dn("ou=q,dc=x")]);

    let subs = collect(&t, "ou=p,dc=x", SearchScope::Subordinates, "(&)");
    assert_eq!(subs, vec![dn("cn=a,ou=p,dc=x")]);
}

#[test]
fn search_filters_apply() {
    let t = small_tree();
    let got = collect(&t, "dc=x", SearchScope::WholeSubtree, "(cn=a)");
    assert_eq!(got, vec![dn("cn=a,ou=p,dc=x")]);
}

#[test]
fn search_missing_base_reports_matched_dn() {
    let t = small_tree();
    let err = t
        .search(
            &dn("ou=nope,dc=x"),
            SearchScope::WholeSubtree,
            &Filter::match_all(),
            |_| {},
        )
        .unwrap_err();
    assert_eq!(
        err,
        TreeError::NoSuchEntry {
            dn: dn("ou=nope,dc=x"),
            matched: Some(dn("dc=x")),
        }
    );
}

#[test]
fn search_yields_independent_copies() {
    let t = small_tree();
    let mut grabbed = Vec::new();
    t.search(
        &dn("dc=x"),
        SearchScope::WholeSubtree,
        &Filter::match_all(),
        |mut e| {
            e.put("injected", &b"x"[..]);
            grabbed.push(e);
        },
    )
    .unwrap();
    assert!(!grabbed.is_empty());
    for e in &grabbed {
        assert!(!t.get_entry(e.dn()).unwrap().has_attribute("injected"));
    }
}

// --------------------- iteration order ---------------------

#[test]
fn iteration_visits_parents_before_children() {
    let mut t = TreeStore::new(dn("dc=x"));
    t.add(&entry("dc=x")).unwrap();
    t.add(&entry("ou=p,dc=x")).unwrap();
    t.add(&entry("ou=q,dc=x")).unwrap();
    t.add(&entry("cn=a,ou=p,dc=x")).unwrap();
    t.add(&entry("cn=b,ou=q,dc=x")).unwrap();

    let order: Vec<Dn> = t.iter().map(|e| e.dn().clone()).collect();
    for (i, d) in order.iter().enumerate() {
        if let Some(parent) = d.parent() {
            if t.exists(&parent) {
                let pi = order.iter().position(|x| x == &parent).unwrap();
                assert!(pi < i, "{} emitted before its parent", d);
            }
        }
    }
}
