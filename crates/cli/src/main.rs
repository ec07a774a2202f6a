// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! mvm - microvm orchestrator admin CLI.

mod commands;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use output::OutputFormat;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "mvm", version, about = "microvm orchestrator admin CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register a git repo the orchestrator is allowed to dispatch tasks into
    Allow {
        /// Path to the repo (must contain a .git directory)
        path: PathBuf,
        /// Alias to register under (defaults to the path's basename)
        #[arg(long)]
        alias: Option<String>,
    },
    /// List registered repos
    List {
        #[arg(short = 'o', long = "output", value_enum, default_value_t)]
        output: OutputFormat,
    },
    /// Remove a registered repo by alias (idempotent)
    Remove {
        alias: String,
    },
    /// Run the daemon in the foreground
    Serve {
        /// Override the listen address (default from MVM_BIND or 127.0.0.1:8765)
        #[arg(long)]
        bind: Option<String>,
        /// Override the slot pool size (default from MVM_MAX_SLOTS or 10)
        #[arg(long = "max-slots")]
        max_slots: Option<u32>,
    },
    /// List tasks recorded on disk across all registered repos
    ListTasks {
        #[arg(short = 'o', long = "output", value_enum, default_value_t)]
        output: OutputFormat,
    },
    /// Show the slot pool's current status
    ListSlots {
        #[arg(short = 'o', long = "output", value_enum, default_value_t)]
        output: OutputFormat,
    },
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Allow { path, alias } => commands::allow::run(&path, alias.as_deref()),
        Commands::List { output } => commands::list::run(output),
        Commands::Remove { alias } => commands::remove::run(&alias),
        Commands::Serve { bind, max_slots } => commands::serve::run(bind, max_slots).await,
        Commands::ListTasks { output } => commands::tasks::list_tasks(output),
        Commands::ListSlots { output } => commands::tasks::list_slots(output),
    }
}
