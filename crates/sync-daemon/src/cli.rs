//! CLI argument parsing for the sync daemon.
//!
//! CLI flags override every other config source.

use clap::{Parser, Subcommand};

/// Vector index synchronizer
///
/// Mirrors a MongoDB collection into a downstream vector index in near
/// real time, with durable resume checkpoints.
#[derive(Parser, Debug)]
#[command(name = "vector-sync")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to config file (overrides default ~/.config/vector-sync/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Set log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the sync worker
    Run {
        /// Override the source strategy (poll or stream)
        #[arg(short, long)]
        mode: Option<String>,

        /// Override the source collection
        #[arg(long)]
        collection: Option<String>,

        /// Override the checkpoint directory
        #[arg(long)]
        checkpoint_dir: Option<String>,
    },

    /// Serve the local indexing API (ingest/search/delete)
    Serve {
        /// Override the listen port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Show the status of a running worker
    Status,
}
