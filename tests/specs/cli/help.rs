//! CLI help output specs.

use crate::prelude::*;

#[test]
fn mvm_no_args_shows_usage_and_exits_nonzero() {
    cli().fails().stderr_has("Usage:");
}

#[test]
fn mvm_help_shows_usage() {
    cli().args(&["--help"]).passes().stdout_has("Usage:");
}

#[test]
fn mvm_help_lists_subcommands() {
    cli()
        .args(&["--help"])
        .passes()
        .stdout_has("allow")
        .stdout_has("list")
        .stdout_has("remove")
        .stdout_has("serve");
}

#[test]
fn mvm_allow_help_shows_usage() {
    cli().args(&["allow", "--help"]).passes().stdout_has("Usage:");
}

#[test]
fn mvm_serve_help_shows_flags() {
    cli()
        .args(&["serve", "--help"])
        .passes()
        .stdout_has("--bind")
        .stdout_has("--max-slots");
}

#[test]
fn mvm_version_shows_version() {
    cli().args(&["--version"]).passes().stdout_has("0.1");
}
