//! CLI error handling specs: unknown repos, bad paths, bad subcommands.

use crate::prelude::*;

#[test]
fn allow_nonexistent_path_is_an_error() {
    let project = Project::empty();

    project
        .mvm()
        .args(&["allow", "/no/such/path/mvm-spec-test"])
        .fails();
}

#[test]
fn allow_non_git_directory_is_an_error() {
    let project = Project::empty();
    // repo_dir exists but git_init_repo() was never called, so it has no .git.
    let path = project.repo_path().to_string_lossy().into_owned();

    project
        .mvm()
        .args(&["allow", &path])
        .fails()
        .stderr_has("not a git repository");
}

#[test]
fn unknown_subcommand_is_an_error() {
    cli().args(&["frobnicate"]).fails().stderr_has("Usage:");
}

#[test]
fn remove_unknown_alias_is_idempotent_success() {
    let project = Project::empty();

    project.mvm().args(&["remove", "ghost"]).passes();
}
