// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Invocation of the declarative VM image builder.
//!
//! The builder itself is an external collaborator (out of scope): a
//! program that, given a task directory and slot, produces a runner
//! executable. This module only specifies the invocation contract.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::process::Command;

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("builder failed to start: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("build failed (exit {code}): {stderr_tail}")]
    Failed { code: i32, stderr_tail: String },
}

/// Arguments passed to the declarative builder for one task/slot pairing.
#[derive(Debug, Clone)]
pub struct BuildArgs {
    pub task_dir: PathBuf,
    pub nix_store_image: PathBuf,
    pub socket_path: PathBuf,
    pub slot: u32,
    pub var_dir: PathBuf,
    pub container_dir: PathBuf,
}

/// Builds a runner executable for a task. Implementations invoke the
/// external image builder or, in tests, fake the outcome entirely.
#[async_trait]
pub trait VmBuilder: Send + Sync {
    async fn build(&self, args: &BuildArgs) -> Result<PathBuf, BuildError>;
}

/// Invokes an external builder binary, passing `BuildArgs` as flags and
/// parsing the runner path from its stdout.
pub struct ExternalVmBuilder {
    builder_path: PathBuf,
}

impl ExternalVmBuilder {
    pub fn new(builder_path: PathBuf) -> Self {
        Self { builder_path }
    }
}

#[async_trait]
impl VmBuilder for ExternalVmBuilder {
    async fn build(&self, args: &BuildArgs) -> Result<PathBuf, BuildError> {
        let output = Command::new(&self.builder_path)
            .arg("--task-dir")
            .arg(&args.task_dir)
            .arg("--nix-store-image")
            .arg(&args.nix_store_image)
            .arg("--socket-path")
            .arg(&args.socket_path)
            .arg("--slot")
            .arg(args.slot.to_string())
            .arg("--var-dir")
            .arg(&args.var_dir)
            .arg("--container-dir")
            .arg(&args.container_dir)
            .output()
            .await
            .map_err(BuildError::Spawn)?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let mut tail_lines: Vec<&str> = stderr.lines().rev().take(20).collect();
            tail_lines.reverse();
            let tail = tail_lines.join("\n");
            return Err(BuildError::Failed {
                code: output.status.code().unwrap_or(-1),
                stderr_tail: tail,
            });
        }

        let runner_path = String::from_utf8_lossy(&output.stdout).trim().to_string();
        Ok(PathBuf::from(runner_path))
    }
}

#[cfg(any(test, feature = "test-support"))]
pub mod fake {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// A builder that always succeeds, returning a fixed runner path.
    pub struct FakeVmBuilder {
        runner_path: PathBuf,
        calls: AtomicUsize,
    }

    impl FakeVmBuilder {
        pub fn new(runner_path: PathBuf) -> Self {
            Self {
                runner_path,
                calls: AtomicUsize::new(0),
            }
        }

        pub fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl VmBuilder for FakeVmBuilder {
        async fn build(&self, _args: &BuildArgs) -> Result<PathBuf, BuildError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.runner_path.clone())
        }
    }

    /// A builder that always fails, for exercising build-error handling.
    pub struct FailingVmBuilder {
        stderr_tail: String,
    }

    impl FailingVmBuilder {
        pub fn new(stderr_tail: impl Into<String>) -> Self {
            Self {
                stderr_tail: stderr_tail.into(),
            }
        }
    }

    #[async_trait]
    impl VmBuilder for FailingVmBuilder {
        async fn build(&self, _args: &BuildArgs) -> Result<PathBuf, BuildError> {
            Err(BuildError::Failed {
                code: 1,
                stderr_tail: self.stderr_tail.clone(),
            })
        }
    }
}

#[cfg(test)]
#[path = "builder_tests.rs"]
mod tests;
