//! HTTP surfaces: the indexing API and the worker metrics exporter.

pub mod api;
pub mod error;
pub mod exporter;

pub use api::{ApiState, IngestRequest, SearchRequest, SearchResponse};
pub use error::ServiceError;

use axum::Router;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Serve a router until the cancellation token fires.
pub async fn serve(
    addr: &str,
    router: Router,
    cancel: CancellationToken,
) -> Result<(), ServiceError> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ServiceError::Internal(format!("bind {}: {}", addr, e)))?;

    info!(addr, "HTTP server listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await
        .map_err(|e| ServiceError::Internal(e.to_string()))
}
