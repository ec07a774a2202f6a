// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Single entry point for shelling out to `git`, with timeout and typed
//! failure on non-zero exit.

use std::path::Path;
use std::process::Output;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;

/// Every git invocation in this crate goes through [`run_git`] and is
/// bounded by this timeout, guarding against a hung fetch against an
/// unreachable remote.
pub const GIT_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Error)]
pub enum GitError {
    #[error("git {args:?} failed to start: {source}")]
    Spawn {
        args: Vec<String>,
        #[source]
        source: std::io::Error,
    },
    #[error("git {args:?} timed out after {}s", .timeout.as_secs())]
    Timeout { args: Vec<String>, timeout: Duration },
    #[error("git {args:?} exited {code}: {stderr}")]
    NonZeroExit {
        args: Vec<String>,
        code: i32,
        stderr: String,
    },
}

/// Run `git <args>` in `cwd`, with an optional isolated `GIT_CONFIG_GLOBAL`
/// override, returning captured stdout/stderr. Raises [`GitError`] on
/// spawn failure, timeout, or non-zero exit.
pub async fn run_git(
    args: &[&str],
    cwd: &Path,
    git_config_global: Option<&Path>,
) -> Result<Output, GitError> {
    let owned_args: Vec<String> = args.iter().map(|s| s.to_string()).collect();
    let mut cmd = Command::new("git");
    cmd.args(args).current_dir(cwd);
    if let Some(config) = git_config_global {
        cmd.env("GIT_CONFIG_GLOBAL", config);
        cmd.env("GIT_CONFIG_NOSYSTEM", "1");
    }

    let output = match tokio::time::timeout(GIT_TIMEOUT, cmd.output()).await {
        Ok(Ok(output)) => output,
        Ok(Err(source)) => {
            return Err(GitError::Spawn {
                args: owned_args,
                source,
            })
        }
        Err(_elapsed) => {
            return Err(GitError::Timeout {
                args: owned_args,
                timeout: GIT_TIMEOUT,
            })
        }
    };

    if !output.status.success() {
        return Err(GitError::NonZeroExit {
            args: owned_args,
            code: output.status.code().unwrap_or(-1),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    Ok(output)
}

/// Decode and trim a command's stdout as UTF-8 (lossy).
pub fn stdout_trimmed(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

#[cfg(test)]
#[path = "shell_tests.rs"]
mod tests;
