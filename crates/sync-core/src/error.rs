//! Error types for the synchronization core.

use thiserror::Error;

use sync_source::SourceError;

/// Errors surfaced by the dispatcher and worker.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The checkpoint store failed in a way retries cannot fix, or a
    /// persist retry loop was interrupted by shutdown.
    #[error("Checkpoint store failure: {0}")]
    CheckpointStore(String),

    /// The change source failed fatally.
    #[error(transparent)]
    Source(#[from] SourceError),
}
