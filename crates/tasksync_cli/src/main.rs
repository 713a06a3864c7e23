//! TaskSync CLI
//!
//! Command-line tools for inspecting and syncing a TaskSync data directory.
//!
//! # Commands
//!
//! - `status` - Show the sync point and a summary of the local snapshot
//! - `inspect` - Dump the local snapshot
//! - `classify` - Fetch the remote and show what a sync would do
//! - `sync` - Run one sync cycle
//! - `reset-tracker` - Forget the sync point
//!
//! # Backends
//!
//! The CLI talks to the self-hosted `GET/PUT /api/data` backend only. The
//! cloud-file and per-user document transports are library types that need
//! an application-supplied storage client and sign-in flow, so they have no
//! config entry here.

mod commands;
mod config;
mod workspace;

use clap::{Parser, Subcommand};
use config::Settings;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use workspace::Workspace;

/// TaskSync command-line tools.
#[derive(Parser)]
#[command(name = "tasksync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the data directory
    #[arg(global = true, short, long)]
    data_dir: Option<PathBuf>,

    /// Path to the config file (default: <data-dir>/config.json)
    #[arg(global = true, short, long)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the sync point and a summary of the local snapshot
    Status {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Dump the local snapshot
    Inspect {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Fetch the remote and print the sync action without applying it
    Classify,

    /// Run one sync cycle against the configured backend
    Sync,

    /// Forget the sync point so the next sync starts fresh
    ResetTracker,

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let workspace = Workspace::new(cli.data_dir);
    let settings = || Settings::load(&workspace.config_path(cli.config.as_deref()));

    match cli.command {
        Commands::Status { format } => commands::status::run(&workspace, &format)?,
        Commands::Inspect { format } => commands::inspect::run(&workspace, &format)?,
        Commands::Classify => commands::sync::classify(&workspace, &settings()?)?,
        Commands::Sync => commands::sync::run(&workspace, &settings()?)?,
        Commands::ResetTracker => commands::reset::run(&workspace)?,
        Commands::Version => {
            println!("TaskSync CLI v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
