// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! mvm-daemon: HTTP/MCP front door over the orchestrator.
//!
//! This module is the shared entrypoint for both the `mvmd` binary and
//! `mvm serve` (the CLI runs the daemon in-process rather than spawning a
//! subprocess, since both live in this workspace).

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod config;
mod tool_server;

pub use config::{ConfigError, DaemonConfig, API_TOKEN_ENV_VAR};
pub use tool_server::OrchestratorServer;

use mvm_adapters::{ExternalVmBuilder, PtyVmSupervisor};
use mvm_engine::{Orchestrator, OrchestratorConfig, OrchestratorError};
use mvm_storage::HostPaths;
use rmcp::transport::streamable_http_server::session::local::LocalSessionManager;
use rmcp::transport::streamable_http_server::StreamableHttpService;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Orchestrator(#[from] OrchestratorError),
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: std::net::SocketAddr,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to install signal handler: {0}")]
    Signal(#[source] std::io::Error),
    #[error(transparent)]
    Serve(#[from] std::io::Error),
}

fn orchestrator_config(config: &DaemonConfig) -> OrchestratorConfig {
    OrchestratorConfig {
        host_paths: HostPaths::new(config.host_state_dir.clone()),
        max_slots: config.max_slots,
        api_token_env: API_TOKEN_ENV_VAR.to_string(),
        stop_deadline: config.stop_deadline,
        builder: Arc::new(ExternalVmBuilder::new(config.builder_path.clone())),
        supervisor: Arc::new(PtyVmSupervisor::new()),
    }
}

/// Build an `Arc<Orchestrator>` from a `DaemonConfig`, wiring up the
/// production `ExternalVmBuilder`/`PtyVmSupervisor` adapters, and run
/// restart recovery (spec.md §4.G) before handing it back.
///
/// Only the process that owns the on-disk state (`mvmd` itself) should call
/// this: `recover()` mutates and persists `task.json` for any non-terminal
/// task whose PID is no longer alive, which would race a live daemon's own
/// in-flight exit handling. Read-only callers (the CLI's `list-tasks`/
/// `list-slots`) must use [`build_orchestrator_read_only`] instead.
pub fn build_orchestrator(config: &DaemonConfig) -> Result<Arc<Orchestrator>, OrchestratorError> {
    let orchestrator = Orchestrator::new(orchestrator_config(config));
    orchestrator.recover()?;
    Ok(orchestrator)
}

/// Build an `Arc<Orchestrator>` for read-only observability, without
/// running restart recovery. Safe to call concurrently with a live `mvmd`
/// process over the same state directory, since it never mutates
/// `task.json`/`slot-assignments.json` itself.
pub fn build_orchestrator_read_only(config: &DaemonConfig) -> Arc<Orchestrator> {
    Orchestrator::new(orchestrator_config(config))
}

/// Run the daemon in the foreground: binds `config.bind` and serves MCP
/// tool calls over HTTP at `/mcp` until a shutdown signal is received.
///
/// Shared by `mvmd`'s own `main` and `mvm serve`.
pub async fn run(config: DaemonConfig) -> Result<(), RunError> {
    let orchestrator = build_orchestrator(&config)?;
    serve(config, orchestrator).await
}

/// Serve an already-constructed orchestrator. Split out from [`run`] so
/// tests and `mvm serve` can reuse an orchestrator built against
/// CLI-resolved state without duplicating recovery.
pub async fn serve(config: DaemonConfig, orchestrator: Arc<Orchestrator>) -> Result<(), RunError> {
    let service = StreamableHttpService::new(
        {
            let orchestrator = orchestrator.clone();
            move || Ok(OrchestratorServer::new(orchestrator.clone()))
        },
        LocalSessionManager::default().into(),
        Default::default(),
    );

    let router = axum::Router::new().nest_service("/mcp", service);

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .map_err(|source| RunError::Bind { addr: config.bind, source })?;

    info!("mvm-daemon listening on http://{}/mcp", config.bind);

    let sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
        .map_err(RunError::Signal)?;
    let sigint = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::interrupt())
        .map_err(RunError::Signal)?;

    axum::serve(listener, router)
        .with_graceful_shutdown(await_shutdown(sigterm, sigint))
        .await?;

    Ok(())
}

/// Waits on an already-installed SIGTERM/SIGINT pair. Signal installation
/// itself can fail (e.g. handler table exhaustion) and must be propagated
/// by the caller via `?` before this is ever invoked; once installed,
/// waiting on `recv()` cannot fail.
async fn await_shutdown(
    mut sigterm: tokio::signal::unix::Signal,
    mut sigint: tokio::signal::unix::Signal,
) {
    tokio::select! {
        _ = sigterm.recv() => {},
        _ = sigint.recv() => {},
    }

    info!("shutdown signal received, stopping mvm-daemon");
}
