// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Terminal-transition events delivered over the event bus.

use crate::task::TaskId;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One event per task, produced exactly once on terminal transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Event {
    Completed {
        task_id: TaskId,
        result: Value,
        merge_result: Value,
    },
    Failed {
        task_id: TaskId,
        error: String,
        exit_code: Option<i32>,
    },
}

impl Event {
    /// The task this event belongs to, regardless of variant.
    pub fn task_id(&self) -> &TaskId {
        match self {
            Event::Completed { task_id, .. } => task_id,
            Event::Failed { task_id, .. } => task_id,
        }
    }
}
