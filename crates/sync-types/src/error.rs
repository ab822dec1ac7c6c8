//! Unified error type for cross-crate concerns.

use thiserror::Error;

/// Errors shared across the sync workspace.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Configuration error (fatal at startup).
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid input error.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
