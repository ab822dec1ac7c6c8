//! Vector index synchronizer
//!
//! # Usage
//!
//! ```bash
//! vector-sync run [--mode poll|stream] [--collection NAME]
//! vector-sync serve [--port PORT]
//! vector-sync status
//! ```
//!
//! # Configuration
//!
//! Loaded in order (later sources override earlier):
//! 1. Config file (~/.config/vector-sync/config.toml)
//! 2. Environment variables (SYNC_*)
//! 3. CLI flags

use anyhow::Result;
use clap::Parser;

use sync_daemon::{run_worker, serve_api, show_status, Cli, Commands, RunOverrides};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            mode,
            collection,
            checkpoint_dir,
        } => {
            run_worker(
                cli.config.as_deref(),
                cli.log_level.as_deref(),
                RunOverrides {
                    mode,
                    collection,
                    checkpoint_dir,
                },
            )
            .await?;
        }
        Commands::Serve { port } => {
            serve_api(cli.config.as_deref(), cli.log_level.as_deref(), port).await?;
        }
        Commands::Status => {
            show_status(cli.config.as_deref()).await?;
        }
    }

    Ok(())
}
