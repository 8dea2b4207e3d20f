//! Integration tests for `IdentityStore` persistence.
//!
//! Each test gets its own temporary directory, so tests can run in parallel
//! without stepping on each other's files.

use std::sync::Arc;

use rolebridge_identity::IdentityStore;
use rolebridge_protocol::{LocalUserId, RemoteAccountId};
use uuid::Uuid;

fn uid() -> LocalUserId {
    LocalUserId::new_random()
}

fn acct(id: &str) -> RemoteAccountId {
    RemoteAccountId::from(id)
}

// =========================================================================
// Persistence
// =========================================================================

#[test]
fn test_open_missing_file_starts_empty() {
    let dir = tempfile::tempdir().unwrap();
    let store = IdentityStore::open(dir.path().join("users.json"));

    assert!(store.is_empty());
    assert_eq!(store.get_local_id(&acct("42")), None);
}

#[test]
fn test_set_link_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("users.json");
    let alice = uid();
    let bob = uid();

    {
        let store = IdentityStore::open(&path);
        store.set_link(acct("111"), alice).unwrap();
        store.set_link(acct("222"), bob).unwrap();
    }

    let reopened = IdentityStore::open(&path);
    assert_eq!(reopened.len(), 2);
    assert_eq!(reopened.get_local_id(&acct("111")), Some(alice));
    assert_eq!(reopened.get_remote_id(bob), Some(acct("222")));
}

#[test]
fn test_set_link_creates_missing_parent_dirs() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("deeper").join("users.json");
    let store = IdentityStore::open(&path);

    store.set_link(acct("42"), uid()).unwrap();

    assert!(path.exists());
}

#[test]
fn test_file_holds_both_indexes() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("users.json");
    let user = LocalUserId(Uuid::nil());
    IdentityStore::open(&path)
        .set_link(acct("80351110224678912"), user)
        .unwrap();

    let raw: serde_json::Value =
        serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();

    let nil = Uuid::nil().to_string();
    assert_eq!(raw["by_remote_id"]["80351110224678912"], nil.as_str());
    assert_eq!(raw["by_local_id"][nil.as_str()], "80351110224678912");
}

#[test]
fn test_no_temp_file_left_after_flush() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("users.json");
    IdentityStore::open(&path).set_link(acct("42"), uid()).unwrap();

    let names: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().into_string().unwrap())
        .collect();
    assert_eq!(names, vec!["users.json".to_string()]);
}

// =========================================================================
// Malformed files
// =========================================================================

#[test]
fn test_open_malformed_file_starts_empty_and_sets_it_aside() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("users.json");
    std::fs::write(&path, b"{ not json").unwrap();

    let store = IdentityStore::open(&path);

    assert!(store.is_empty());
    assert!(dir.path().join("users.json.bak").exists());
}

#[test]
fn test_open_malformed_file_then_write_recovers() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("users.json");
    std::fs::write(&path, b"[1, 2, 3]").unwrap();
    let user = uid();

    IdentityStore::open(&path).set_link(acct("42"), user).unwrap();

    assert_eq!(IdentityStore::open(&path).get_local_id(&acct("42")), Some(user));
}

#[test]
fn test_open_empty_file_starts_empty() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("users.json");
    std::fs::write(&path, b"  \n").unwrap();

    assert!(IdentityStore::open(&path).is_empty());
    assert!(!dir.path().join("users.json.bak").exists());
}

// =========================================================================
// Link semantics
// =========================================================================

#[test]
fn test_relink_local_user_replaces_old_account() {
    let store = IdentityStore::in_memory();
    let user = uid();
    store.set_link(acct("old"), user).unwrap();
    store.set_link(acct("new"), user).unwrap();

    assert_eq!(store.get_remote_id(user), Some(acct("new")));
    assert_eq!(store.get_local_id(&acct("old")), None);
    assert_eq!(store.len(), 1);
}

#[test]
fn test_relink_remote_account_moves_to_new_user() {
    let store = IdentityStore::in_memory();
    let first = uid();
    let second = uid();
    store.set_link(acct("42"), first).unwrap();
    store.set_link(acct("42"), second).unwrap();

    assert_eq!(store.get_local_id(&acct("42")), Some(second));
    assert_eq!(store.get_remote_id(first), None);
}

#[test]
fn test_for_each_visits_every_link() {
    let store = IdentityStore::in_memory();
    for i in 0..5 {
        store.set_link(acct(&i.to_string()), uid()).unwrap();
    }

    let mut seen = Vec::new();
    store.for_each(|local, remote| seen.push((local, remote.clone())));

    assert_eq!(seen.len(), 5);
    assert_eq!(seen, store.snapshot());
}

#[test]
fn test_for_each_visitor_may_write_back() {
    let store = IdentityStore::in_memory();
    let user = uid();
    store.set_link(acct("42"), user).unwrap();

    // Would deadlock if the visitor ran under the read lock.
    store.for_each(|local, _| {
        store.set_link(acct("43"), local).unwrap();
    });

    assert_eq!(store.get_remote_id(user), Some(acct("43")));
}

#[test]
fn test_in_memory_store_has_no_path() {
    assert!(IdentityStore::in_memory().path().is_none());
}

// =========================================================================
// Concurrency
// =========================================================================

#[test]
fn test_concurrent_readers_and_writer_see_whole_pairs() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(IdentityStore::open(dir.path().join("users.json")));
    let users: Vec<_> = (0..20).map(|_| uid()).collect();

    let writer = {
        let store = Arc::clone(&store);
        let users = users.clone();
        std::thread::spawn(move || {
            for (i, user) in users.into_iter().enumerate() {
                store.set_link(acct(&i.to_string()), user).unwrap();
            }
        })
    };

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let store = Arc::clone(&store);
            std::thread::spawn(move || {
                for _ in 0..200 {
                    for (local, remote) in store.snapshot() {
                        assert_eq!(store.get_remote_id(local), Some(remote.clone()));
                        assert_eq!(store.get_local_id(&remote), Some(local));
                    }
                }
            })
        })
        .collect();

    writer.join().unwrap();
    for r in readers {
        r.join().unwrap();
    }
    assert_eq!(store.len(), 20);
}
