//! `mvm allow` specs: registering repos into the allowlist.

use crate::prelude::*;

#[test]
fn allow_registers_repo_under_its_basename() {
    let project = Project::empty();
    project.git_init_repo();
    let path = project.repo_path().to_string_lossy().into_owned();

    let basename = project.repo_path().file_name().unwrap().to_string_lossy().into_owned();

    project
        .mvm()
        .args(&["allow", &path])
        .passes()
        .stdout_has(&format!("registered '{basename}'"));
}

#[test]
fn allow_with_explicit_alias_uses_it() {
    let project = Project::empty();
    project.git_init_repo();
    let path = project.repo_path().to_string_lossy().into_owned();

    project
        .mvm()
        .args(&["allow", &path, "--alias", "demo"])
        .passes()
        .stdout_has("registered 'demo'");
}

#[test]
fn allow_same_path_twice_returns_the_same_alias() {
    let project = Project::empty();
    project.git_init_repo();
    let path = project.repo_path().to_string_lossy().into_owned();

    project.mvm().args(&["allow", &path, "--alias", "demo"]).passes();
    // Re-allowing the identical canonical path is idempotent: it returns
    // the existing alias rather than minting "demo-2".
    project
        .mvm()
        .args(&["allow", &path, "--alias", "demo"])
        .passes()
        .stdout_has("registered 'demo'");
}

#[test]
fn allow_alias_collision_on_a_different_path_is_disambiguated() {
    let project = Project::empty();
    project.git_init_repo();
    let path_a = project.repo_path().to_string_lossy().into_owned();

    let other = tempfile::tempdir().unwrap();
    std::process::Command::new("git")
        .args(["init", "-b", "main"])
        .current_dir(other.path())
        .status()
        .unwrap();

    project.mvm().args(&["allow", &path_a, "--alias", "demo"]).passes();
    project
        .mvm()
        .args(&["allow", &other.path().to_string_lossy(), "--alias", "demo"])
        .passes()
        .stdout_has("registered 'demo-2'");
}
