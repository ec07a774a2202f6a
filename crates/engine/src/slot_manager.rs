// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bounded integer slot pool with persisted repo affinity.
//!
//! Slots are numbered `1..=max`. At most one task occupies a slot at a time;
//! the active set lives in memory (rebuilt on restart by the orchestrator
//! scanning task directories), while the preferred-slot-per-repo affinity
//! map survives restarts in `slot-assignments.json`.

use mvm_core::{ActiveSlot, SlotId, SlotPoolStatus, TaskId};
use mvm_storage::{hash_repo_path, AtomicWriter, FsWriter, HostPaths, SlotAffinityStore, StorageError};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SlotError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("all {max} slots are busy")]
    AllSlotsBusy {
        max: u32,
        active: Vec<ActiveSlot>,
    },
    #[error("slot {slot} is not active")]
    NotActive { slot: SlotId },
}

/// Tracks which slots are occupied and by whom, and the persisted
/// repo -> slot affinity cache.
pub struct SlotManager<W: AtomicWriter + Clone = FsWriter> {
    max: u32,
    affinity: SlotAffinityStore<W>,
    active: Mutex<BTreeMap<SlotId, ActiveSlot>>,
}

impl SlotManager<FsWriter> {
    pub fn new(host_paths: HostPaths, max: u32) -> Self {
        Self {
            max,
            affinity: SlotAffinityStore::new(host_paths),
            active: Mutex::new(BTreeMap::new()),
        }
    }
}

impl<W: AtomicWriter + Clone> SlotManager<W> {
    pub fn with_writer(writer: W, host_paths: HostPaths, max: u32) -> Self {
        Self {
            max,
            affinity: SlotAffinityStore::with_writer(writer, host_paths),
            active: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn max(&self) -> u32 {
        self.max
    }

    /// Mark `slot` occupied by `task_id`/`repo_alias` without going through
    /// the usual acquire path. Used by the orchestrator during restart
    /// recovery, where the assignment already happened in a prior process.
    pub fn reserve(&self, slot: SlotId, task_id: TaskId, repo_alias: String) {
        self.active.lock().insert(
            slot,
            ActiveSlot {
                slot,
                task_id,
                repo_alias,
            },
        );
    }

    /// Assign a slot to `task_id` for the repo at `repo_path`, preferring
    /// the repo's last-used slot if it is free, otherwise the lowest-numbered
    /// free slot.
    pub fn acquire(
        &self,
        repo_path: &Path,
        repo_alias: &str,
        task_id: TaskId,
    ) -> Result<SlotId, SlotError> {
        let canonical = std::fs::canonicalize(repo_path).unwrap_or_else(|_| repo_path.to_path_buf());
        let preferred = self.affinity.get(&canonical)?;

        let mut active = self.active.lock();

        let chosen = preferred
            .filter(|s| !active.contains_key(s))
            .or_else(|| (1..=self.max).find(|s| !active.contains_key(s)));

        let Some(slot) = chosen else {
            return Err(SlotError::AllSlotsBusy {
                max: self.max,
                active: active.values().cloned().collect(),
            });
        };

        active.insert(
            slot,
            ActiveSlot {
                slot,
                task_id,
                repo_alias: repo_alias.to_string(),
            },
        );
        drop(active);

        self.affinity.set(&canonical, slot)?;
        Ok(slot)
    }

    /// Release `slot`. Idempotent; never touches affinity.
    pub fn release(&self, slot: SlotId) {
        self.active.lock().remove(&slot);
    }

    /// Snapshot of the pool for `list_slots`.
    pub fn status(&self) -> SlotPoolStatus {
        let active = self.active.lock();
        let available = (1..=self.max).filter(|s| !active.contains_key(s)).collect();
        SlotPoolStatus {
            max: self.max,
            active: active.values().cloned().collect(),
            available,
        }
    }
}

/// Exposed for callers (and tests) that need the raw affinity key without
/// depending on `mvm-storage` directly.
pub fn affinity_key(repo_path: &Path) -> u64 {
    hash_repo_path(repo_path)
}

#[cfg(test)]
#[path = "slot_manager_tests.rs"]
mod tests;
