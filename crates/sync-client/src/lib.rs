//! Downstream indexing client.
//!
//! Thin HTTP wrapper over the ingest/delete contract of the indexing
//! service. The client performs no retries itself; it classifies each
//! failure as retryable or terminal and leaves the retry policy to the
//! dispatcher.

pub mod error;
pub mod http;
pub mod request;

pub use error::ClientError;
pub use http::{HttpClientConfig, HttpIndexingClient};
pub use request::{IndexRequest, UpsertRequest};

use async_trait::async_trait;

/// Delivery seam between the dispatcher and the downstream service.
///
/// Every request must be idempotent: delivering the same request twice for
/// the same id leaves the downstream index in the same state as once.
#[async_trait]
pub trait IndexingClient: Send + Sync {
    /// Deliver one indexing request.
    ///
    /// A delete for an id the downstream does not know is already
    /// satisfied and must be reported as success, not an error.
    async fn deliver(&self, request: &IndexRequest) -> Result<(), ClientError>;
}
