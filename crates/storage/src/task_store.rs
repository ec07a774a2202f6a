// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Persistence for task records and their sibling files.

use crate::atomic::{read_json, write_json, AtomicWriter, FsWriter, StorageError};
use crate::paths::TaskPaths;
use mvm_core::Task;
use serde_json::Value;
use std::io::Write as _;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

/// Reads and writes `task.json`, `result.json`, and `merge-result.json`
/// inside a task's directory, plus the auxiliary plaintext files
/// (`task.md`, `start-ref`, `task-id`, `.api-key`).
#[derive(Debug, Clone, Default)]
pub struct TaskStore<W: AtomicWriter + Clone = FsWriter> {
    writer: W,
}

impl TaskStore<FsWriter> {
    pub fn new() -> Self {
        Self { writer: FsWriter }
    }
}

impl<W: AtomicWriter + Clone> TaskStore<W> {
    pub fn with_writer(writer: W) -> Self {
        Self { writer }
    }

    pub fn save_task(&self, task: &Task) -> Result<(), StorageError> {
        let paths = TaskPaths::new(task.task_dir());
        write_json(&self.writer, &paths.task_json(), task)
    }

    pub fn load_task(&self, task_dir: &Path) -> Result<Option<Task>, StorageError> {
        let paths = TaskPaths::new(task_dir.to_path_buf());
        read_json(&self.writer, &paths.task_json())
    }

    pub fn load_result(&self, task_dir: &Path) -> Result<Option<Value>, StorageError> {
        let paths = TaskPaths::new(task_dir.to_path_buf());
        read_json(&self.writer, &paths.result_json())
    }

    /// Write `result.json` directly. Used only for pre-start failures the
    /// orchestrator synthesizes itself; the guest runner writes this file
    /// for every other outcome.
    pub fn save_result(&self, task_dir: &Path, result: &Value) -> Result<(), StorageError> {
        let paths = TaskPaths::new(task_dir.to_path_buf());
        write_json(&self.writer, &paths.result_json(), result)
    }

    pub fn save_merge_result(&self, task_dir: &Path, result: &Value) -> Result<(), StorageError> {
        let paths = TaskPaths::new(task_dir.to_path_buf());
        write_json(&self.writer, &paths.merge_result_json(), result)
    }

    pub fn load_merge_result(&self, task_dir: &Path) -> Result<Option<Value>, StorageError> {
        let paths = TaskPaths::new(task_dir.to_path_buf());
        read_json(&self.writer, &paths.merge_result_json())
    }

    /// Write the verbatim task description.
    pub fn write_description(&self, task_dir: &Path, description: &str) -> Result<(), StorageError> {
        let paths = TaskPaths::new(task_dir.to_path_buf());
        write_plain(&paths.task_md(), description.as_bytes())
    }

    pub fn write_start_ref(&self, task_dir: &Path, start_ref: &str) -> Result<(), StorageError> {
        let paths = TaskPaths::new(task_dir.to_path_buf());
        write_plain(&paths.start_ref(), start_ref.as_bytes())
    }

    pub fn write_task_id(&self, task_dir: &Path, short_id: &str) -> Result<(), StorageError> {
        let paths = TaskPaths::new(task_dir.to_path_buf());
        write_plain(&paths.task_id_file(), short_id.as_bytes())
    }

    /// Write the transient credential file with `0600` permissions. The
    /// guest contract requires it be deleted once read.
    pub fn write_api_key(&self, task_dir: &Path, key: &str) -> Result<(), StorageError> {
        let paths = TaskPaths::new(task_dir.to_path_buf());
        let path = paths.api_key();
        write_plain(&path, key.as_bytes())?;
        let permissions = std::fs::Permissions::from_mode(0o600);
        std::fs::set_permissions(&path, permissions)
            .map_err(|source| StorageError::Io { path: path.display().to_string(), source })?;
        Ok(())
    }

    pub fn api_key_present(&self, task_dir: &Path) -> bool {
        TaskPaths::new(task_dir.to_path_buf()).api_key().exists()
    }

    /// Absolute path to the serial console log, without reading its content.
    pub fn serial_log_path(&self, task_dir: &Path) -> std::path::PathBuf {
        TaskPaths::new(task_dir.to_path_buf()).serial_log()
    }

    /// Remove the entire task directory.
    pub fn delete_task_dir(&self, task_dir: &Path) -> Result<(), StorageError> {
        self.writer.remove_dir_all(task_dir)
    }
}

fn write_plain(path: &Path, data: &[u8]) -> Result<(), StorageError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|source| StorageError::Io { path: parent.display().to_string(), source })?;
    }
    let mut file = std::fs::File::create(path)
        .map_err(|source| StorageError::Io { path: path.display().to_string(), source })?;
    file.write_all(data)
        .map_err(|source| StorageError::Io { path: path.display().to_string(), source })?;
    Ok(())
}

#[cfg(test)]
#[path = "task_store_tests.rs"]
mod tests;
