//! Tests for the container state store.
//!
//! Validates exclusive creation, atomic saves, corrupt-record handling,
//! start markers, and listing.

use runproc::{ContainerState, ContainerStatus, Error, StateStore};
use std::fs;
use std::os::unix::fs::PermissionsExt;
use tempfile::TempDir;

fn store() -> (TempDir, StateStore) {
    let temp_dir = TempDir::new().unwrap();
    let store = StateStore::with_path(temp_dir.path().join("state")).unwrap();
    (temp_dir, store)
}

// =============================================================================
// StateStore Creation Tests
// =============================================================================

#[test]
fn test_state_store_creates_root() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path().join("deeply").join("nested").join("state");

    let store = StateStore::with_path(root.clone()).unwrap();

    assert!(root.is_dir(), "state root should be created");
    assert_eq!(store.root(), root);
    let mode = fs::metadata(&root).unwrap().permissions().mode() & 0o777;
    assert_eq!(mode, 0o700, "state root should be private");
}

#[test]
fn test_state_store_root_is_file() {
    let temp_dir = TempDir::new().unwrap();
    let file = temp_dir.path().join("not-a-dir");
    fs::write(&file, b"x").unwrap();

    assert!(StateStore::with_path(file).is_err());
}

// =============================================================================
// Create / Load / Save Tests
// =============================================================================

#[test]
fn test_create_then_load() {
    let (_temp, store) = store();
    let mut state = ContainerState::new("web", "/bundles/web", 4242);

    store.create(&mut state).unwrap();

    assert!(store.exists("web"));
    let loaded = store.load("web").unwrap();
    assert_eq!(loaded.id, "web");
    assert_eq!(loaded.pid, 4242);
    assert_eq!(loaded.bundle, "/bundles/web");
    assert_eq!(loaded.status, ContainerStatus::Created);
}

#[test]
fn test_create_is_exclusive() {
    let (_temp, store) = store();
    store
        .create(&mut ContainerState::new("dup", "/b", 1))
        .unwrap();

    let err = store
        .create(&mut ContainerState::new("dup", "/other", 2))
        .unwrap_err();
    assert!(matches!(err, Error::ContainerAlreadyExists(ref id) if id == "dup"));

    // The first record is untouched.
    assert_eq!(store.load("dup").unwrap().pid, 1);
}

#[test]
fn test_create_stamps_created_status() {
    let (_temp, store) = store();
    let mut state = ContainerState::new("c1", "/b", 1);
    state.status = ContainerStatus::Stopped;

    store.create(&mut state).unwrap();

    assert_eq!(store.load("c1").unwrap().status, ContainerStatus::Created);
}

#[test]
fn test_save_overwrites_and_leaves_no_temp_files() {
    let (_temp, store) = store();
    let mut state = ContainerState::new("c1", "/b", 10);
    store.create(&mut state).unwrap();

    state.mark_running().unwrap();
    store.save(&state).unwrap();

    let loaded = store.load("c1").unwrap();
    assert_eq!(loaded.status, ContainerStatus::Running);
    assert!(loaded.started_at.is_some());

    let entries: Vec<_> = fs::read_dir(store.container_dir("c1"))
        .unwrap()
        .map(|e| e.unwrap().file_name().into_string().unwrap())
        .collect();
    assert_eq!(entries, vec!["state.json".to_string()]);
}

#[test]
fn test_save_without_record_fails() {
    let (_temp, store) = store();
    let state = ContainerState::new("ghost", "/b", 1);

    assert!(store.save(&state).is_err());
}

#[test]
fn test_load_missing_is_not_found() {
    let (_temp, store) = store();

    let err = store.load("nope").unwrap_err();
    assert!(err.is_not_found());
}

#[test]
fn test_load_corrupt_record() {
    let (_temp, store) = store();
    fs::create_dir_all(store.container_dir("bad")).unwrap();
    fs::write(store.state_path("bad"), b"{ not json").unwrap();

    let err = store.load("bad").unwrap_err();
    assert!(matches!(err, Error::StateCorrupt { .. }));
}

#[test]
fn test_record_uses_camel_case_keys() {
    let (_temp, store) = store();
    store
        .create(&mut ContainerState::new("c1", "/b", 7))
        .unwrap();

    let raw = fs::read_to_string(store.state_path("c1")).unwrap();
    let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(value["status"], "created");
    assert!(value.get("createdAt").is_some());
    assert!(value.get("exitCode").is_none(), "unset fields are omitted");
}

// =============================================================================
// Path Safety Tests
// =============================================================================

#[test]
fn test_invalid_ids_rejected() {
    let (_temp, store) = store();

    for id in ["", "../escape", "a/b", ".hidden"] {
        assert!(store.load(id).is_err(), "'{}' should be rejected", id);
        assert!(!store.exists(id));
        let mut state = ContainerState::new(id, "/b", 1);
        assert!(store.create(&mut state).is_err());
    }
}

// =============================================================================
// Delete / Marker / List Tests
// =============================================================================

#[test]
fn test_delete_is_idempotent() {
    let (_temp, store) = store();
    store
        .create(&mut ContainerState::new("c1", "/b", 1))
        .unwrap();
    store.mark_started("c1").unwrap();

    store.delete("c1").unwrap();
    assert!(!store.container_dir("c1").exists());

    store.delete("c1").unwrap();
    store.delete("never-existed").unwrap();
}

#[test]
fn test_start_marker() {
    let (_temp, store) = store();
    store
        .create(&mut ContainerState::new("c1", "/b", 1))
        .unwrap();

    assert!(!store.is_started("c1"));
    store.mark_started("c1").unwrap();
    assert!(store.is_started("c1"));
}

#[test]
fn test_mark_started_without_record_fails() {
    let (_temp, store) = store();

    let err = store.mark_started("missing").unwrap_err();
    assert!(matches!(err, Error::StartFailed { .. }));
}

#[test]
fn test_list_sorted_and_skips_garbage() {
    let (_temp, store) = store();
    for (id, pid) in [("zeta", 3), ("alpha", 1), ("mid", 2)] {
        store
            .create(&mut ContainerState::new(id, "/b", pid))
            .unwrap();
    }
    fs::create_dir_all(store.container_dir("broken")).unwrap();
    fs::write(store.state_path("broken"), b"garbage").unwrap();
    fs::create_dir_all(store.root().join("empty")).unwrap();
    fs::write(store.root().join("stray-file"), b"x").unwrap();

    let ids: Vec<String> = store.list().unwrap().into_iter().map(|s| s.id).collect();
    assert_eq!(ids, vec!["alpha", "mid", "zeta"]);
}
