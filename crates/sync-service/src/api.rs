//! Indexing API surface.
//!
//! Wire contract consumed by the sync dispatcher (and anything else):
//! `POST /ingest` upserts, `POST /search` queries, `POST /delete` removes
//! (404 when the id is unknown), `GET /health` reports liveness. All
//! writes are idempotent by id so redelivery after a crash is harmless.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::{header, StatusCode};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info};

use sync_vector::{IndexedDocument, SearchHit, VectorStore};

use crate::error::ServiceError;

/// Shared state behind the API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub store: Arc<RwLock<Box<dyn VectorStore>>>,
    /// When set, every route except `/health` requires this bearer token.
    pub token: Option<String>,
}

impl ApiState {
    pub fn new(store: Box<dyn VectorStore>, token: Option<String>) -> Self {
        Self {
            store: Arc::new(RwLock::new(store)),
            token,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestRequest {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct IngestResponse {
    pub id: String,
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

fn default_top_k() -> usize {
    10
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SearchResponse {
    pub hits: Vec<SearchHit>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteRequest {
    pub id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub documents: usize,
}

/// Build the API router.
pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/ingest", post(ingest))
        .route("/search", post(search))
        .route("/delete", post(delete_document))
        .route("/health", get(health))
        .layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .with_state(state)
}

/// Bearer-token check for every route except `/health`.
///
/// A no-op when no token is configured.
async fn require_auth(
    State(state): State<ApiState>,
    request: Request,
    next: Next,
) -> Result<Response, ServiceError> {
    if request.uri().path() != "/health" {
        if let Some(expected) = &state.token {
            if !bearer_matches(
                request
                    .headers()
                    .get(header::AUTHORIZATION)
                    .and_then(|v| v.to_str().ok()),
                expected,
            ) {
                return Err(ServiceError::Unauthorized);
            }
        }
    }
    Ok(next.run(request).await)
}

fn bearer_matches(header: Option<&str>, expected: &str) -> bool {
    header
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(|t| t == expected)
        .unwrap_or(false)
}

async fn ingest(
    State(state): State<ApiState>,
    Json(request): Json<IngestRequest>,
) -> Result<Json<IngestResponse>, ServiceError> {
    if request.id.is_empty() {
        return Err(ServiceError::BadRequest("id must not be empty".into()));
    }

    let mut doc = IndexedDocument::new(request.id.clone(), request.text);
    doc.metadata = request.metadata;

    state.store.write().await.index(doc)?;
    debug!(id = %request.id, "Document indexed");

    Ok(Json(IngestResponse {
        id: request.id,
        status: "indexed".into(),
    }))
}

async fn search(
    State(state): State<ApiState>,
    Json(request): Json<SearchRequest>,
) -> Result<Json<SearchResponse>, ServiceError> {
    let hits = state
        .store
        .read()
        .await
        .search(&request.query, request.top_k)?;
    Ok(Json(SearchResponse { hits }))
}

async fn delete_document(
    State(state): State<ApiState>,
    Json(request): Json<DeleteRequest>,
) -> Result<StatusCode, ServiceError> {
    let removed = state.store.write().await.delete(&request.id)?;
    if !removed {
        return Err(ServiceError::NotFound(request.id));
    }
    info!(id = %request.id, "Document deleted");
    Ok(StatusCode::OK)
}

async fn health(State(state): State<ApiState>) -> Json<HealthResponse> {
    let stats = state.store.read().await.stats();
    Json(HealthResponse {
        status: "ok".into(),
        documents: stats.document_count,
    })
}
