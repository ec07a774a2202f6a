// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task identifier and state machine.

use crate::id::ShortId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

crate::define_id! {
    /// Unique identifier for a task.
    ///
    /// Stored as a lowercase hex string (128 bits of randomness in
    /// production). The first 8 characters are used for display only —
    /// the full identifier is what's recorded in filenames and git refs.
    #[derive(Default)]
    pub struct TaskId;
}

/// Status of a task.
///
/// Progression is exactly `Pending -> Running -> (Completed | Failed)`.
/// `Pending -> Failed` is permitted for errors that occur before the VM
/// starts (unknown repo, slot exhaustion, git setup failure).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl TaskStatus {
    /// Whether this status is terminal (`completed` or `failed`).
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Running => "running",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

/// Errors raised by invalid task state transitions.
///
/// These indicate a bug in the orchestrator (the state machine was driven
/// out of order), never a user-facing condition.
#[derive(Debug, Error)]
pub enum TaskError {
    #[error("task {id} cannot transition from {from} to {to}")]
    InvalidTransition {
        id: TaskId,
        from: TaskStatus,
        to: TaskStatus,
    },
}

/// Configuration used to create a new task.
#[derive(Debug, Clone)]
pub struct TaskConfig {
    pub id: TaskId,
    pub description: String,
    pub slot: u32,
    pub repo_alias: String,
    pub repo_path: PathBuf,
    pub created_at: DateTime<Utc>,
}

/// A task instance: identity, status, timestamps, and the paths it owns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub description_path: PathBuf,
    pub status: TaskStatus,
    pub slot: u32,
    pub repo_alias: String,
    pub repo_path: PathBuf,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub pid: Option<u32>,
    pub exit_code: Option<i32>,
    pub start_ref: Option<String>,
    pub branch: Option<String>,
}

impl Task {
    /// Create a new task in `Pending` status. `start_ref` is set later, once
    /// the git engine has captured it (spec requires it be set before the VM
    /// starts, not necessarily at task-creation time).
    pub fn new(config: TaskConfig) -> Self {
        let task_dir = config.repo_path.join(".microvm/tasks").join(config.id.as_str());
        Self {
            id: config.id,
            description_path: task_dir.join("task.md"),
            status: TaskStatus::Pending,
            slot: config.slot,
            repo_alias: config.repo_alias,
            repo_path: config.repo_path,
            created_at: config.created_at,
            started_at: None,
            completed_at: None,
            pid: None,
            exit_code: None,
            start_ref: None,
            branch: None,
        }
    }

    /// The directory this task's files are rooted under:
    /// `<repo_path>/.microvm/tasks/<task_id>/`.
    pub fn task_dir(&self) -> PathBuf {
        self.repo_path.join(".microvm/tasks").join(self.id.as_str())
    }

    /// Short display form of the task id (first 8 hex chars).
    pub fn short_id(&self) -> &str {
        self.id.as_str().short(8)
    }

    /// Record the start reference and branch captured by the git engine.
    /// Must be called before `mark_running`.
    pub fn set_start_ref(&mut self, start_ref: String, branch: Option<String>) {
        self.start_ref = Some(start_ref);
        self.branch = branch;
    }

    /// Transition `Pending -> Running`, stamping `started_at` and the VM pid.
    pub fn mark_running(&mut self, pid: u32, now: DateTime<Utc>) -> Result<(), TaskError> {
        self.transition(TaskStatus::Running)?;
        self.pid = Some(pid);
        self.started_at = Some(now);
        Ok(())
    }

    /// Transition to `Completed`, stamping `completed_at` and the exit code.
    pub fn mark_completed(&mut self, exit_code: Option<i32>, now: DateTime<Utc>) -> Result<(), TaskError> {
        self.transition(TaskStatus::Completed)?;
        self.exit_code = exit_code;
        self.completed_at = Some(now);
        Ok(())
    }

    /// Transition to `Failed`, stamping `completed_at` and the exit code.
    /// Valid from either `Pending` (pre-start failure) or `Running`.
    pub fn mark_failed(&mut self, exit_code: Option<i32>, now: DateTime<Utc>) -> Result<(), TaskError> {
        self.transition(TaskStatus::Failed)?;
        self.exit_code = exit_code;
        self.completed_at = Some(now);
        Ok(())
    }

    fn transition(&mut self, to: TaskStatus) -> Result<(), TaskError> {
        let allowed = matches!(
            (self.status, to),
            (TaskStatus::Pending, TaskStatus::Running)
                | (TaskStatus::Pending, TaskStatus::Failed)
                | (TaskStatus::Running, TaskStatus::Completed)
                | (TaskStatus::Running, TaskStatus::Failed)
        );
        if !allowed {
            return Err(TaskError::InvalidTransition {
                id: self.id.clone(),
                from: self.status,
                to,
            });
        }
        self.status = to;
        Ok(())
    }
}

#[cfg(test)]
#[path = "task_tests.rs"]
mod tests;
