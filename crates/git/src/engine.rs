// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Isolated clone setup and merge-back onto the host repository.
//!
//! The host repository is never mutated except through [`GitEngine::merge_back`].
//! All host-repo operations are serialized through a single process-wide
//! mutex; concurrent branch updates on the same working copy are unsafe.

use crate::shell::{run_git, stdout_trimmed, GitError};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Result of cloning the host repository into a task's isolated working copy.
#[derive(Debug, Clone)]
pub struct SetupOutcome {
    /// Commit hash on the host repo at task creation; the merge base.
    pub start_ref: String,
    /// Host branch name at task creation, `None` if detached.
    pub branch: Option<String>,
}

/// Serializes host-repository mutation and owns the plumbing for cloning,
/// merging back, and cleaning up per-task git state.
#[derive(Clone)]
pub struct GitEngine {
    host_lock: Arc<Mutex<()>>,
}

impl Default for GitEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl GitEngine {
    pub fn new() -> Self {
        Self {
            host_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Snapshot the host repo's current commit, clone it into
    /// `<task_dir>/repo`, and check that commit out on a working branch.
    pub async fn setup_isolated_repo(
        &self,
        host_repo: &Path,
        task_dir: &Path,
    ) -> Result<SetupOutcome, GitError> {
        let _guard = self.host_lock.lock().await;

        let head = run_git(&["rev-parse", "HEAD"], host_repo, None).await?;
        let start_ref = stdout_trimmed(&head);
        let branch = match run_git(&["symbolic-ref", "--short", "HEAD"], host_repo, None).await {
            Ok(output) => Some(stdout_trimmed(&output)),
            Err(GitError::NonZeroExit { .. }) => None, // detached HEAD
            Err(e) => return Err(e),
        };

        let clone_dir = task_dir.join("repo");
        tokio::fs::create_dir_all(&clone_dir)
            .await
            .map_err(|source| GitError::Spawn {
                args: vec!["mkdir".into(), clone_dir.display().to_string()],
                source,
            })?;
        run_git(&["init"], &clone_dir, None).await?;
        run_git(
            &["remote", "add", "origin", &host_repo.display().to_string()],
            &clone_dir,
            None,
        )
        .await?;

        let git_config_global = isolated_git_config(task_dir).await?;

        if run_git(
            &["fetch", "--no-tags", "origin", &start_ref],
            &clone_dir,
            Some(&git_config_global),
        )
        .await
        .is_err()
        {
            warn!(%start_ref, "direct fetch failed, falling back to bundle import");
            let bundle_path = task_dir.join("start-ref.bundle");
            run_git(
                &["bundle", "create", &bundle_path.display().to_string(), &start_ref],
                host_repo,
                None,
            )
            .await?;
            run_git(
                &[
                    "fetch",
                    "--no-tags",
                    &bundle_path.display().to_string(),
                    &start_ref,
                ],
                &clone_dir,
                Some(&git_config_global),
            )
            .await?;
        }

        run_git(
            &["checkout", "-B", "work", "FETCH_HEAD"],
            &clone_dir,
            Some(&git_config_global),
        )
        .await?;

        info!(%start_ref, branch = branch.as_deref().unwrap_or("<detached>"), "isolated clone ready");
        Ok(SetupOutcome { start_ref, branch })
    }

    /// Merge a task's commits back onto the host repo's branch, following
    /// the noop / fast-forward / rebase / conflict / detached-head decision
    /// tree. Never propagates a git failure: unexpected errors are folded
    /// into the returned JSON as `{"merged": false, "reason": "error", ...}`.
    pub async fn merge_back(&self, host_repo: &Path, task_dir: &Path, task_id: &str) -> Value {
        let _guard = self.host_lock.lock().await;
        let task_ref = format!("refs/tasks/{task_id}");
        match self.merge_back_inner(host_repo, task_dir, &task_ref).await {
            Ok(value) => value,
            Err(e) => error_result(&e.to_string(), Some(&task_ref)),
        }
    }

    async fn merge_back_inner(
        &self,
        host_repo: &Path,
        task_dir: &Path,
        task_ref: &str,
    ) -> Result<Value, GitError> {
        let clone_dir = task_dir.join("repo");
        let start_ref = tokio::fs::read_to_string(task_dir.join("start-ref"))
            .await
            .map_err(|source| GitError::Spawn {
                args: vec!["read".into(), "start-ref".into()],
                source,
            })?;
        let start_ref = start_ref.trim();

        let count_output = run_git(
            &["rev-list", "--count", &format!("{start_ref}..HEAD")],
            &clone_dir,
            None,
        )
        .await?;
        let commits: i64 = stdout_trimmed(&count_output).parse().unwrap_or(0);
        if commits == 0 {
            return Ok(json!({"merged": true, "method": "noop", "commits": 0}));
        }

        run_git(
            &["fetch", &clone_dir.display().to_string(), &format!("HEAD:{task_ref}")],
            host_repo,
            None,
        )
        .await?;

        let host_head = stdout_trimmed(&run_git(&["rev-parse", "HEAD"], host_repo, None).await?);
        let host_branch = match run_git(&["symbolic-ref", "--short", "HEAD"], host_repo, None).await {
            Ok(output) => Some(stdout_trimmed(&output)),
            Err(GitError::NonZeroExit { .. }) => None,
            Err(e) => return Err(e),
        };

        let Some(branch) = host_branch else {
            return Ok(json!({"merged": false, "reason": "detached-head", "task_ref": task_ref}));
        };

        if host_head == start_ref {
            run_git(
                &["update-ref", &format!("refs/heads/{branch}"), task_ref],
                host_repo,
                None,
            )
            .await?;
            return Ok(json!({
                "merged": true,
                "method": "fast-forward",
                "commits": commits,
                "conflicts": [],
            }));
        }

        self.rebase_onto(host_repo, task_ref, &branch, commits).await
    }

    async fn rebase_onto(
        &self,
        host_repo: &Path,
        task_ref: &str,
        branch: &str,
        commits: i64,
    ) -> Result<Value, GitError> {
        let worktree_dir = std::env::temp_dir().join(format!("mvm-rebase-{}", uuid_like(task_ref)));
        run_git(
            &[
                "worktree",
                "add",
                "--detach",
                &worktree_dir.display().to_string(),
                task_ref,
            ],
            host_repo,
            None,
        )
        .await?;

        let rebase_result = run_git(&["rebase", branch], &worktree_dir, None).await;
        let outcome = match rebase_result {
            Ok(_) => {
                let new_head =
                    stdout_trimmed(&run_git(&["rev-parse", "HEAD"], &worktree_dir, None).await?);
                run_git(
                    &["update-ref", &format!("refs/heads/{branch}"), &new_head],
                    host_repo,
                    None,
                )
                .await?;
                Ok(json!({"merged": true, "method": "rebase", "commits": commits}))
            }
            Err(_) => {
                let conflicted = run_git(
                    &["diff", "--name-only", "--diff-filter=U"],
                    &worktree_dir,
                    None,
                )
                .await
                .map(|o| {
                    stdout_trimmed(&o)
                        .lines()
                        .map(str::to_string)
                        .collect::<Vec<_>>()
                })
                .unwrap_or_default();
                let _ = run_git(&["rebase", "--abort"], &worktree_dir, None).await;
                Ok(json!({
                    "merged": false,
                    "reason": "conflicts",
                    "conflicts": conflicted,
                    "task_ref": task_ref,
                }))
            }
        };

        let _ = run_git(
            &["worktree", "remove", "--force", &worktree_dir.display().to_string()],
            host_repo,
            None,
        )
        .await;
        outcome
    }

    /// Delete the preserved `refs/tasks/<task_id>` ref. Idempotent.
    pub async fn delete_task_ref(&self, host_repo: &Path, task_id: &str) -> Result<(), GitError> {
        let _guard = self.host_lock.lock().await;
        let task_ref = format!("refs/tasks/{task_id}");
        match run_git(&["update-ref", "-d", &task_ref], host_repo, None).await {
            Ok(_) => Ok(()),
            Err(GitError::NonZeroExit { .. }) => Ok(()), // missing ref is success
            Err(e) => Err(e),
        }
    }
}

fn error_result(message: &str, task_ref: Option<&str>) -> Value {
    match task_ref {
        Some(r) => json!({"merged": false, "reason": "error", "error": message, "task_ref": r}),
        None => json!({"merged": false, "reason": "error", "error": message}),
    }
}

async fn isolated_git_config(task_dir: &Path) -> Result<PathBuf, GitError> {
    let path = task_dir.join(".git-config-global");
    tokio::fs::write(&path, "[safe]\n\tdirectory = *\n")
        .await
        .map_err(|source| GitError::Spawn {
            args: vec!["write".into(), path.display().to_string()],
            source,
        })?;
    Ok(path)
}

fn uuid_like(task_ref: &str) -> String {
    task_ref.replace('/', "-")
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
