//! `mvm list` specs.

use crate::prelude::*;

#[test]
fn list_on_empty_registry_prints_nothing() {
    let project = Project::empty();

    let stdout = project.mvm().args(&["list"]).passes().stdout();
    assert!(stdout.trim().is_empty(), "expected empty list, got: {stdout}");
}

#[test]
fn list_shows_alias_and_path() {
    let project = Project::empty();
    project.git_init_repo();
    let path = project.repo_path().to_string_lossy().into_owned();
    project.mvm().args(&["allow", &path, "--alias", "demo"]).passes();

    project
        .mvm()
        .args(&["list"])
        .passes()
        .stdout_has("demo: ")
        .stdout_has(&path);
}

#[test]
fn list_json_emits_an_array() {
    let project = Project::empty();
    project.git_init_repo();
    let path = project.repo_path().to_string_lossy().into_owned();
    project.mvm().args(&["allow", &path, "--alias", "demo"]).passes();

    let stdout = project.mvm().args(&["list", "-o", "json"]).passes().stdout();
    let entries: Vec<serde_json::Value> = serde_json::from_str(&stdout).unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["alias"], "demo");
}

#[test]
fn list_preserves_insertion_order() {
    let project = Project::empty();
    project.git_init_repo();
    let path = project.repo_path().to_string_lossy().into_owned();
    project.mvm().args(&["allow", &path, "--alias", "z-repo"]).passes();

    let other = tempfile::tempdir().unwrap();
    std::process::Command::new("git")
        .args(["init", "-b", "main"])
        .current_dir(other.path())
        .status()
        .unwrap();
    project
        .mvm()
        .args(&["allow", &other.path().to_string_lossy(), "--alias", "a-repo"])
        .passes();

    let stdout = project.mvm().args(&["list"]).passes().stdout();
    let z_pos = stdout.find("z-repo").unwrap();
    let a_pos = stdout.find("a-repo").unwrap();
    assert!(z_pos < a_pos, "expected insertion order (z-repo before a-repo), got: {stdout}");
}
