//! Error types for change sources.

use thiserror::Error;

/// Errors produced by a change source.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The source cannot be reached. Retried with backoff; the checkpoint
    /// does not move.
    #[error("Change source unavailable: {0}")]
    Unavailable(String),

    /// The resumption token is no longer valid. The caller restarts from
    /// the beginning and logs a data-quality warning (re-processing, never
    /// loss).
    #[error("Subscription invalidated: {0}")]
    SubscriptionInvalidated(String),

    /// The caller passed a position this source cannot resume from.
    #[error("Bad position for this source: expected {expected}, got {got}")]
    BadPosition {
        expected: &'static str,
        got: String,
    },

    /// A source record could not be decoded into a change event.
    #[error("Malformed source record: {0}")]
    Decode(String),

    /// The active strategy does not support this operation.
    #[error("Unsupported operation: {0}")]
    Unsupported(&'static str),
}

impl SourceError {
    /// Whether the caller should retry after a backoff pause.
    pub fn is_transient(&self) -> bool {
        matches!(self, SourceError::Unavailable(_))
    }
}
