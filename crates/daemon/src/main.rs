// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! mvmd — the microvm orchestrator daemon.
//!
//! A long-running process that dispatches developer-agent tasks into
//! ephemeral microVMs and merges their results back into the host repo
//! via git, exposing its tool contracts over MCP-over-HTTP.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

use mvm_daemon::{DaemonConfig, RunError};
use tracing::error;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    if let Some(arg) = std::env::args().nth(1) {
        match arg.as_str() {
            "--version" | "-V" | "-v" => {
                println!("mvmd {}", env!("CARGO_PKG_VERSION"));
                return Ok(());
            }
            "--help" | "-h" | "help" => {
                println!("mvmd {}", env!("CARGO_PKG_VERSION"));
                println!("microvm orchestrator daemon");
                println!();
                println!("USAGE:");
                println!("    mvmd");
                println!();
                println!("mvmd is typically started via `mvm serve` and should not be");
                println!("invoked directly. It listens for MCP tool calls over HTTP.");
                return Ok(());
            }
            _ => {
                eprintln!("error: unexpected argument '{arg}'");
                eprintln!("Usage: mvmd [--help | --version]");
                std::process::exit(1);
            }
        }
    }

    let config = DaemonConfig::from_env()?;
    let _log_guard = setup_logging(&config)?;

    tracing::info!(
        bind = %config.bind,
        max_slots = config.max_slots,
        state_dir = %config.host_state_dir.display(),
        "starting mvmd"
    );

    if let Err(e) = mvm_daemon::run(config).await {
        error!("mvmd exited with an error: {e}");
        return Err(map_run_error(e));
    }

    tracing::info!("mvmd stopped");
    Ok(())
}

fn map_run_error(err: RunError) -> Box<dyn std::error::Error> {
    Box::new(err)
}

fn setup_logging(
    config: &DaemonConfig,
) -> Result<tracing_appender::non_blocking::WorkerGuard, std::io::Error> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    std::fs::create_dir_all(&config.log_dir)?;

    let file_appender = tracing_appender::rolling::never(&config.log_dir, "mvmd.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_env("MVM_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(non_blocking))
        .init();

    Ok(guard)
}
