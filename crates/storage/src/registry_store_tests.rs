// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use tempfile::tempdir;

fn init_git_repo(dir: &Path) {
    std::fs::create_dir_all(dir.join(".git")).unwrap();
}

fn host(dir: &Path) -> HostPaths {
    HostPaths::new(dir.join("host-state"))
}

#[test]
fn allow_rejects_non_git_directory() {
    let repos = tempdir().unwrap();
    let host_dir = tempdir().unwrap();
    let store = RegistryStore::new(host(host_dir.path()));
    let err = store.allow(repos.path(), None).unwrap_err();
    assert!(matches!(err, RegistryError::NotGitRepo { .. }));
}

#[test]
fn allow_uses_basename_when_alias_unset() {
    let repos = tempdir().unwrap();
    let repo_path = repos.path().join("my-service");
    init_git_repo(&repo_path);
    let host_dir = tempdir().unwrap();
    let store = RegistryStore::new(host(host_dir.path()));
    let alias = store.allow(&repo_path, None).unwrap();
    assert_eq!(alias, "my-service");
}

#[test]
fn allow_dedupes_colliding_alias_for_different_paths() {
    let repos = tempdir().unwrap();
    let a = repos.path().join("a");
    let b = repos.path().join("b");
    init_git_repo(&a);
    init_git_repo(&b);
    let host_dir = tempdir().unwrap();
    let store = RegistryStore::new(host(host_dir.path()));
    let alias1 = store.allow(&a, Some("svc")).unwrap();
    let alias2 = store.allow(&b, Some("svc")).unwrap();
    assert_eq!(alias1, "svc");
    assert_eq!(alias2, "svc-2");
}

#[test]
fn allow_is_idempotent_for_the_same_path() {
    let repos = tempdir().unwrap();
    let repo_path = repos.path().join("svc");
    init_git_repo(&repo_path);
    let host_dir = tempdir().unwrap();
    let store = RegistryStore::new(host(host_dir.path()));
    let alias1 = store.allow(&repo_path, Some("svc")).unwrap();
    let alias2 = store.allow(&repo_path, Some("svc")).unwrap();
    assert_eq!(alias1, alias2);
    assert_eq!(store.list().unwrap().len(), 1);
}

#[test]
fn allow_same_path_under_a_different_alias_registers_a_second_entry() {
    let repos = tempdir().unwrap();
    let repo_path = repos.path().join("svc");
    init_git_repo(&repo_path);
    let host_dir = tempdir().unwrap();
    let store = RegistryStore::new(host(host_dir.path()));
    let alias1 = store.allow(&repo_path, Some("svc")).unwrap();
    let alias2 = store.allow(&repo_path, Some("svc-alt")).unwrap();
    assert_eq!(alias1, "svc");
    assert_eq!(alias2, "svc-alt");

    let entries = store.list().unwrap();
    assert_eq!(entries.len(), 2);
    let canonical = std::fs::canonicalize(&repo_path).unwrap();
    assert!(entries.iter().all(|e| e.path == canonical));
    assert_eq!(store.resolve("svc").unwrap(), canonical);
    assert_eq!(store.resolve("svc-alt").unwrap(), canonical);
}

#[test]
fn resolve_unknown_alias_errors() {
    let host_dir = tempdir().unwrap();
    let store = RegistryStore::new(host(host_dir.path()));
    let err = store.resolve("missing").unwrap_err();
    assert!(matches!(err, RegistryError::UnknownRepo { .. }));
}

#[test]
fn resolve_returns_canonical_path() {
    let repos = tempdir().unwrap();
    let repo_path = repos.path().join("svc");
    init_git_repo(&repo_path);
    let host_dir = tempdir().unwrap();
    let store = RegistryStore::new(host(host_dir.path()));
    let alias = store.allow(&repo_path, None).unwrap();
    let resolved = store.resolve(&alias).unwrap();
    assert_eq!(resolved, std::fs::canonicalize(&repo_path).unwrap());
}

#[test]
fn remove_is_idempotent_and_persists() {
    let repos = tempdir().unwrap();
    let repo_path = repos.path().join("svc");
    init_git_repo(&repo_path);
    let host_dir = tempdir().unwrap();
    let store = RegistryStore::new(host(host_dir.path()));
    let alias = store.allow(&repo_path, None).unwrap();
    store.remove(&alias).unwrap();
    store.remove(&alias).unwrap();
    assert!(store.list().unwrap().is_empty());
}

#[test]
fn list_is_stable_insertion_order() {
    let repos = tempdir().unwrap();
    let host_dir = tempdir().unwrap();
    let store = RegistryStore::new(host(host_dir.path()));
    for name in ["first", "second", "third"] {
        let path = repos.path().join(name);
        init_git_repo(&path);
        store.allow(&path, Some(name)).unwrap();
    }
    let aliases: Vec<String> = store.list().unwrap().into_iter().map(|e| e.alias).collect();
    assert_eq!(aliases, vec!["first", "second", "third"]);
}

#[test]
fn state_survives_reload_from_a_fresh_store() {
    let repos = tempdir().unwrap();
    let repo_path = repos.path().join("svc");
    init_git_repo(&repo_path);
    let host_dir = tempdir().unwrap();
    {
        let store = RegistryStore::new(host(host_dir.path()));
        store.allow(&repo_path, Some("svc")).unwrap();
    }
    let reloaded = RegistryStore::new(host(host_dir.path()));
    assert_eq!(reloaded.resolve("svc").unwrap(), std::fs::canonicalize(&repo_path).unwrap());
}
