// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Slot identity and pool status DTOs.

use crate::task::TaskId;
use serde::{Deserialize, Serialize};

/// A slot number in `0..max_slots`. Slots are plain indices, not IDs in the
/// `define_id!` sense — the pool size is bounded and small, so a `u32` is
/// simpler than a newtype wrapper here.
pub type SlotId = u32;

/// A slot currently occupied by a running task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveSlot {
    pub slot: SlotId,
    pub task_id: TaskId,
    pub repo_alias: String,
}

/// Snapshot of the slot pool returned by `list_slots`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotPoolStatus {
    pub max: u32,
    pub active: Vec<ActiveSlot>,
    pub available: Vec<SlotId>,
}
