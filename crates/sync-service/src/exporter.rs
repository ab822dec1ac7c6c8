//! Worker metrics and health exporter.
//!
//! Separate from the indexing API: the exporter binds its own port,
//! never requires auth, and reads the worker's shared `SyncMetrics`.

use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};

use sync_core::{SyncMetrics, WorkerState};

/// Build the exporter router.
pub fn router(metrics: Arc<SyncMetrics>) -> Router {
    Router::new()
        .route("/metrics", get(prometheus))
        .route("/health", get(health))
        .with_state(metrics)
}

async fn prometheus(State(metrics): State<Arc<SyncMetrics>>) -> Response {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        metrics.render_prometheus(),
    )
        .into_response()
}

/// 200 while the worker is live, 503 once it has stopped.
async fn health(State(metrics): State<Arc<SyncMetrics>>) -> Response {
    let snapshot = metrics.snapshot();
    let status = if metrics.state() == WorkerState::Stopped {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };
    (status, Json(snapshot)).into_response()
}
