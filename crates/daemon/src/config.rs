// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon configuration sourced from environment variables, with CLI-level
//! overrides for `bind` and `max_slots` (the only two knobs `mvm serve`
//! exposes, per SPEC_FULL.md's CLI contract expansion).

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Name of the well-known environment variable `run_task` reads the API
/// token from (spec.md §6, "an API token sourced from a well-known
/// environment variable").
pub const API_TOKEN_ENV_VAR: &str = "MVM_API_TOKEN";

const DEFAULT_BIND: &str = "127.0.0.1:8765";
const DEFAULT_MAX_SLOTS: u32 = 10;
const DEFAULT_STOP_DEADLINE: Duration = Duration::from_secs(10);
const DEFAULT_BUILDER_NAME: &str = "mvm-vm-builder";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid bind address '{addr}': {source}")]
    InvalidBind {
        addr: String,
        #[source]
        source: std::net::AddrParseError,
    },
    #[error("invalid MVM_MAX_SLOTS value '{0}': must be a positive integer")]
    InvalidMaxSlots(String),
    #[error("invalid MVM_STOP_DEADLINE_MS value '{0}': must be an integer")]
    InvalidStopDeadline(String),
    #[error("could not determine the home directory for the default state dir (set MVM_STATE_DIR)")]
    NoHomeDir,
}

/// Everything the daemon needs to construct an `Orchestrator` and bind its
/// HTTP listener.
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    pub bind: SocketAddr,
    pub max_slots: u32,
    /// Host-wide state root: `<user-home>/.microvm-orchestrator/`.
    pub host_state_dir: PathBuf,
    /// Path (or bare name, resolved via `PATH`) to the declarative VM
    /// image builder executable.
    pub builder_path: PathBuf,
    pub stop_deadline: Duration,
    /// Directory the daemon's own log file lives in.
    pub log_dir: PathBuf,
}

impl DaemonConfig {
    /// Load from environment variables:
    /// - `MVM_BIND` (default `127.0.0.1:8765`)
    /// - `MVM_MAX_SLOTS` (default `10`)
    /// - `MVM_STATE_DIR` (default `~/.microvm-orchestrator`)
    /// - `MVM_BUILDER_PATH` (default `mvm-vm-builder`, resolved via `PATH`)
    /// - `MVM_STOP_DEADLINE_MS` (default `10000`)
    /// - `MVM_LOG_DIR` (default `<state_dir>/logs`)
    pub fn from_env() -> Result<Self, ConfigError> {
        let host_state_dir = match std::env::var("MVM_STATE_DIR") {
            Ok(dir) => PathBuf::from(dir),
            Err(_) => default_state_dir()?,
        };

        let bind = std::env::var("MVM_BIND").unwrap_or_else(|_| DEFAULT_BIND.to_string());
        let bind = parse_bind(&bind)?;

        let max_slots = match std::env::var("MVM_MAX_SLOTS") {
            Ok(s) => s.parse().map_err(|_| ConfigError::InvalidMaxSlots(s))?,
            Err(_) => DEFAULT_MAX_SLOTS,
        };

        let builder_path = std::env::var("MVM_BUILDER_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_BUILDER_NAME));

        let stop_deadline = match std::env::var("MVM_STOP_DEADLINE_MS") {
            Ok(s) => {
                let ms: u64 = s.parse().map_err(|_| ConfigError::InvalidStopDeadline(s))?;
                Duration::from_millis(ms)
            }
            Err(_) => DEFAULT_STOP_DEADLINE,
        };

        let log_dir = std::env::var("MVM_LOG_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| host_state_dir.join("logs"));

        Ok(Self {
            bind,
            max_slots,
            host_state_dir,
            builder_path,
            stop_deadline,
            log_dir,
        })
    }

    /// Apply CLI-supplied overrides for `--bind` and `--max-slots` on top
    /// of the environment-derived defaults.
    pub fn with_overrides(
        mut self,
        bind: Option<String>,
        max_slots: Option<u32>,
    ) -> Result<Self, ConfigError> {
        if let Some(bind) = bind {
            self.bind = parse_bind(&bind)?;
        }
        if let Some(max_slots) = max_slots {
            self.max_slots = max_slots;
        }
        Ok(self)
    }
}

fn parse_bind(addr: &str) -> Result<SocketAddr, ConfigError> {
    addr.parse().map_err(|source| ConfigError::InvalidBind {
        addr: addr.to_string(),
        source,
    })
}

fn default_state_dir() -> Result<PathBuf, ConfigError> {
    let home = dirs::home_dir().ok_or(ConfigError::NoHomeDir)?;
    Ok(home.join(".microvm-orchestrator"))
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
