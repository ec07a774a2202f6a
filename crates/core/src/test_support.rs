// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test helpers for use across crates.
//!
//! Gated behind the `test-support` feature.

use crate::event::Event;
use crate::repo::RepoEntry;
use crate::task::{Task, TaskConfig, TaskId};
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use std::path::PathBuf;

/// A fixed instant used as `created_at` for tasks built by these helpers,
/// so assertions on serialized output don't depend on wall-clock time.
pub fn fixed_now() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z")
        .expect("valid fixed timestamp")
        .with_timezone(&Utc)
}

/// Build a `Task` in `Pending` status under `/test-repos/<alias>`.
pub fn pending_task(id: &str, repo_alias: &str, slot: u32) -> Task {
    Task::new(TaskConfig {
        id: TaskId::new(id),
        description: "test task".to_string(),
        slot,
        repo_alias: repo_alias.to_string(),
        repo_path: PathBuf::from(format!("/test-repos/{repo_alias}")),
        created_at: fixed_now(),
    })
}

/// Build a `Task` in `Pending` status rooted at a caller-supplied path,
/// for tests that exercise real filesystem persistence.
pub fn pending_task_at(id: &str, repo_alias: &str, slot: u32, repo_path: PathBuf) -> Task {
    Task::new(TaskConfig {
        id: TaskId::new(id),
        description: "test task".to_string(),
        slot,
        repo_alias: repo_alias.to_string(),
        repo_path,
        created_at: fixed_now(),
    })
}

/// Build a `Task` already transitioned to `Running`.
pub fn running_task(id: &str, repo_alias: &str, slot: u32, pid: u32) -> Task {
    let mut task = pending_task(id, repo_alias, slot);
    task.set_start_ref("0".repeat(40), Some("main".to_string()));
    task.mark_running(pid, fixed_now())
        .expect("pending -> running is always valid");
    task
}

/// A successful result payload shaped like what the guest runner writes.
pub fn success_result() -> Value {
    json!({"success": true, "summary": "done"})
}

/// A fast-forward merge result payload.
pub fn fast_forward_merge_result() -> Value {
    json!({"strategy": "fast-forward", "error": null})
}

pub fn completed_event(id: &str) -> Event {
    Event::Completed {
        task_id: TaskId::new(id),
        result: success_result(),
        merge_result: fast_forward_merge_result(),
    }
}

pub fn failed_event(id: &str, error: &str) -> Event {
    Event::Failed {
        task_id: TaskId::new(id),
        error: error.to_string(),
        exit_code: Some(1),
    }
}

/// A registry entry under a scratch path, suitable for tests that never
/// touch the real filesystem.
pub fn repo_entry(alias: &str) -> RepoEntry {
    RepoEntry::new(alias, PathBuf::from(format!("/test-repos/{alias}")), fixed_now())
}
