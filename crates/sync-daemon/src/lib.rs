//! Daemon wiring for the vector-sync binary.

pub mod cli;
pub mod commands;

pub use cli::{Cli, Commands};
pub use commands::{run_worker, serve_api, show_status, RunOverrides};
