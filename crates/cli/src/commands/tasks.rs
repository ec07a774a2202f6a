// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Read-only observability commands backed by `Orchestrator::list_tasks`
//! and `Orchestrator::list_slots` — added so an operator debugging a stuck
//! slot pool has a CLI path that doesn't require crafting an HTTP request.

use crate::output::OutputFormat;
use anyhow::Result;
use mvm_daemon::DaemonConfig;

pub fn list_tasks(format: OutputFormat) -> Result<()> {
    let config = DaemonConfig::from_env()?;
    let orchestrator = mvm_daemon::build_orchestrator_read_only(&config);
    let tasks = orchestrator.list_tasks()?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&tasks)?),
        OutputFormat::Text => {
            for task in tasks {
                println!(
                    "{}  {:<9}  slot={}  repo={}",
                    task.id, task.status, task.slot, task.repo_alias
                );
            }
        }
    }
    Ok(())
}

pub fn list_slots(format: OutputFormat) -> Result<()> {
    let config = DaemonConfig::from_env()?;
    let orchestrator = mvm_daemon::build_orchestrator_read_only(&config);
    let status = orchestrator.list_slots();

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&status)?),
        OutputFormat::Text => {
            println!("max: {}", status.max);
            for active in &status.active {
                println!("  slot {}: task {} ({})", active.slot, active.task_id, active.repo_alias);
            }
            println!("available: {:?}", status.available);
        }
    }
    Ok(())
}
