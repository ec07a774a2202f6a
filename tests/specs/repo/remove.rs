//! `mvm remove` specs.

use crate::prelude::*;

#[test]
fn remove_drops_a_registered_alias() {
    let project = Project::empty();
    project.git_init_repo();
    let path = project.repo_path().to_string_lossy().into_owned();
    project.mvm().args(&["allow", &path, "--alias", "demo"]).passes();

    project.mvm().args(&["remove", "demo"]).passes();

    let stdout = project.mvm().args(&["list"]).passes().stdout();
    assert!(!stdout.contains("demo"), "expected 'demo' to be gone, got: {stdout}");
}

#[test]
fn remove_is_idempotent() {
    let project = Project::empty();
    project.git_init_repo();
    let path = project.repo_path().to_string_lossy().into_owned();
    project.mvm().args(&["allow", &path, "--alias", "demo"]).passes();

    project.mvm().args(&["remove", "demo"]).passes();
    // Second removal of the same (now-absent) alias is still a success.
    project.mvm().args(&["remove", "demo"]).passes();
}
