// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Well-known paths under host-wide and per-task state directories.

use std::path::{Path, PathBuf};

/// Host-wide state root: `<user-home>/.microvm-orchestrator/`.
#[derive(Debug, Clone)]
pub struct HostPaths {
    root: PathBuf,
}

impl HostPaths {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn allowed_repos_json(&self) -> PathBuf {
        self.root.join("allowed-repos.json")
    }

    pub fn slot_assignments_json(&self) -> PathBuf {
        self.root.join("slot-assignments.json")
    }

    pub fn slot_dir(&self, slot: u32) -> PathBuf {
        self.root.join("slots").join(slot.to_string())
    }
}

/// Per-task directory layout: `<repo_path>/.microvm/tasks/<task_id>/`.
#[derive(Debug, Clone)]
pub struct TaskPaths {
    dir: PathBuf,
}

impl TaskPaths {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn task_json(&self) -> PathBuf {
        self.dir.join("task.json")
    }

    pub fn task_md(&self) -> PathBuf {
        self.dir.join("task.md")
    }

    pub fn start_ref(&self) -> PathBuf {
        self.dir.join("start-ref")
    }

    pub fn task_id_file(&self) -> PathBuf {
        self.dir.join("task-id")
    }

    pub fn repo_clone(&self) -> PathBuf {
        self.dir.join("repo")
    }

    pub fn serial_log(&self) -> PathBuf {
        self.dir.join("serial.log")
    }

    pub fn result_json(&self) -> PathBuf {
        self.dir.join("result.json")
    }

    pub fn merge_result_json(&self) -> PathBuf {
        self.dir.join("merge-result.json")
    }

    pub fn claude_stream_jsonl(&self) -> PathBuf {
        self.dir.join("claude-stream.jsonl")
    }

    pub fn api_key(&self) -> PathBuf {
        self.dir.join(".api-key")
    }
}

/// The tasks directory for a given repo: `<repo_path>/.microvm/tasks/`.
pub fn tasks_dir(repo_path: &Path) -> PathBuf {
    repo_path.join(".microvm/tasks")
}
