//! Error types for the vector store wrapper.

use thiserror::Error;

/// Errors that can occur in vector store operations.
#[derive(Debug, Error)]
pub enum VectorError {
    /// Document rejected before indexing.
    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    /// Query rejected before search.
    #[error("Invalid query: {0}")]
    InvalidQuery(String),
}
