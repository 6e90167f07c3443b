//! Syncline CLI
//!
//! Command-line tools for inspecting a syncline client's on-disk store.
//!
//! # Commands
//!
//! - `inspect` - Summarize the session slot, queue, and cache
//! - `queue` - List queued actions
//! - `session` - Show or clear the persisted session slot
//! - `purge` - Drop the cache and/or queue namespaces

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Syncline command-line store tools.
#[derive(Parser)]
#[command(name = "syncline")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the store directory
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Summarize the session slot, queue, and cache
    Inspect {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// List queued actions
    Queue {
        /// Show only abandoned actions
        #[arg(short, long)]
        abandoned: bool,

        /// Maximum number of actions to list
        #[arg(short, long)]
        limit: Option<usize>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show or clear the persisted session slot
    Session {
        /// Remove the session slot
        #[arg(short, long)]
        clear: bool,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Drop the cache and/or queue namespaces
    Purge {
        /// Drop cached collections
        #[arg(short, long)]
        cache: bool,

        /// Drop queued actions
        #[arg(short, long)]
        queue: bool,

        /// Dry run - show what would be removed
        #[arg(short, long)]
        dry_run: bool,
    },

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Inspect { format } => {
            let path = cli.path.ok_or("Store path required for inspect")?;
            commands::inspect::run(&path, &format).await?;
        }
        Commands::Queue {
            abandoned,
            limit,
            format,
        } => {
            let path = cli.path.ok_or("Store path required for queue")?;
            commands::queue::run(&path, abandoned, limit, &format).await?;
        }
        Commands::Session { clear, format } => {
            let path = cli.path.ok_or("Store path required for session")?;
            commands::session::run(&path, clear, &format)?;
        }
        Commands::Purge {
            cache,
            queue,
            dry_run,
        } => {
            let path = cli.path.ok_or("Store path required for purge")?;
            let all = !cache && !queue;
            commands::purge::run(&path, cache || all, queue || all, dry_run).await?;
        }
        Commands::Version => {
            println!("syncline CLI v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
