// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

pub mod allow;
pub mod list;
pub mod remove;
pub mod serve;
pub mod tasks;

use mvm_daemon::DaemonConfig;
use mvm_storage::{HostPaths, RegistryStore};

/// Construct a registry store against the same state dir the daemon uses,
/// without needing a VM builder or supervisor — `allow`/`list`/`remove` are
/// pure registry operations.
pub(crate) fn registry() -> anyhow::Result<RegistryStore> {
    let config = DaemonConfig::from_env()?;
    Ok(RegistryStore::new(HostPaths::new(config.host_state_dir)))
}
