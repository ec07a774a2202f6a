// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use mvm_core::test_support::pending_task_at;
use serde_json::json;
use tempfile::tempdir;

#[test]
fn save_and_load_task_roundtrips() {
    let dir = tempdir().unwrap();
    let task = pending_task_at("t1", "svc", 0, dir.path().to_path_buf());
    let store = TaskStore::new();
    store.save_task(&task).unwrap();
    let loaded = store.load_task(&task.task_dir()).unwrap().unwrap();
    assert_eq!(loaded.id, task.id);
    assert_eq!(loaded.status, task.status);
}

#[test]
fn load_task_missing_returns_none() {
    let dir = tempdir().unwrap();
    let store = TaskStore::new();
    let loaded = store.load_task(&dir.path().join("nope")).unwrap();
    assert!(loaded.is_none());
}

#[test]
fn merge_result_roundtrips() {
    let dir = tempdir().unwrap();
    let store = TaskStore::new();
    let result = json!({"strategy": "rebase", "error": null});
    store.save_merge_result(dir.path(), &result).unwrap();
    let loaded = store.load_merge_result(dir.path()).unwrap().unwrap();
    assert_eq!(loaded, result);
}

#[test]
fn result_roundtrips() {
    let dir = tempdir().unwrap();
    let store = TaskStore::new();
    let result = json!({"success": false, "error": "no result"});
    store.save_result(dir.path(), &result).unwrap();
    let loaded = store.load_result(dir.path()).unwrap().unwrap();
    assert_eq!(loaded, result);
}

#[test]
fn description_is_written_verbatim() {
    let dir = tempdir().unwrap();
    let store = TaskStore::new();
    store.write_description(dir.path(), "fix the thing\nwith two lines").unwrap();
    let content = std::fs::read_to_string(dir.path().join("task.md")).unwrap();
    assert_eq!(content, "fix the thing\nwith two lines");
}

#[test]
fn api_key_is_written_with_owner_only_permissions() {
    use std::os::unix::fs::PermissionsExt;
    let dir = tempdir().unwrap();
    let store = TaskStore::new();
    store.write_api_key(dir.path(), "secret-token").unwrap();
    let path = dir.path().join(".api-key");
    assert!(store.api_key_present(dir.path()));
    let mode = std::fs::metadata(&path).unwrap().permissions().mode() & 0o777;
    assert_eq!(mode, 0o600);
}

#[test]
fn delete_task_dir_removes_everything() {
    let dir = tempdir().unwrap();
    let task_dir = dir.path().join("task");
    let store = TaskStore::new();
    store.write_description(&task_dir, "desc").unwrap();
    assert!(task_dir.exists());
    store.delete_task_dir(&task_dir).unwrap();
    assert!(!task_dir.exists());
}

#[test]
fn delete_task_dir_is_idempotent() {
    let dir = tempdir().unwrap();
    let store = TaskStore::new();
    store.delete_task_dir(&dir.path().join("never-existed")).unwrap();
}
