// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use anyhow::Result;
use mvm_daemon::DaemonConfig;

/// Runs `mvmd` in-process (not a subprocess spawn — both binaries live in
/// this workspace) with CLI overrides applied on top of the environment.
pub async fn run(bind: Option<String>, max_slots: Option<u32>) -> Result<()> {
    let config = DaemonConfig::from_env()?.with_overrides(bind, max_slots)?;
    mvm_daemon::run(config).await?;
    Ok(())
}
