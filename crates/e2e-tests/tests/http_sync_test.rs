//! Full-stack tests over real HTTP: dispatcher -> reqwest client -> axum
//! service -> in-memory vector store.

use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use tokio_util::sync::CancellationToken;

use e2e_tests::{delete_event, fast_retry, upsert_event};
use sync_client::{HttpClientConfig, HttpIndexingClient};
use sync_core::{Dispatcher, MemoryCheckpointStore, SyncMetrics};
use sync_service::api::{self, ApiState};
use sync_source::ChangeBatch;
use sync_types::{Checkpoint, Position};
use sync_vector::TfCosineStore;

/// Serve the indexing API on an ephemeral port, returning its base URL.
async fn spawn_api(state: ApiState) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let router = api::router(state);
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}

fn http_dispatcher(base_url: &str, token: Option<&str>) -> (Dispatcher, Arc<SyncMetrics>, Arc<MemoryCheckpointStore>) {
    let mut config =
        HttpClientConfig::new(base_url).with_timeout(Duration::from_secs(2));
    if let Some(token) = token {
        config = config.with_token(token);
    }
    let client = HttpIndexingClient::new(config).unwrap();

    let store = Arc::new(MemoryCheckpointStore::new());
    let metrics = Arc::new(SyncMetrics::new());
    let dispatcher = Dispatcher::new(
        Arc::new(client),
        store.clone(),
        "articles",
        fast_retry(),
        metrics.clone(),
        CancellationToken::new(),
    );
    (dispatcher, metrics, store)
}

#[tokio::test]
async fn test_sync_over_http_and_search() {
    let state = ApiState::new(Box::new(TfCosineStore::new()), None);
    let base_url = spawn_api(state).await;
    let (dispatcher, metrics, _) = http_dispatcher(&base_url, None);

    let mut checkpoint = Checkpoint::beginning();
    let events = vec![
        upsert_event(1, "rust borrow checker and ownership"),
        upsert_event(2, "sourdough bread baking schedule"),
    ];
    let outcome = dispatcher
        .dispatch(
            &mut checkpoint,
            ChangeBatch {
                events,
                next_position: Position::Sequence(2),
            },
        )
        .await
        .unwrap();

    assert_eq!(outcome.delivered, 2);
    assert_eq!(metrics.events_failed(), 0);

    // Query through the wire as a consumer would.
    let response = reqwest::Client::new()
        .post(format!("{}/search", base_url))
        .json(&serde_json::json!({ "query": "rust ownership", "top_k": 1 }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);

    let body: serde_json::Value = response.json().await.unwrap();
    let hits = body["hits"].as_array().unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0]["id"], "doc-1");
    assert_eq!(hits[0]["metadata"]["title"], "Document 1");
    assert_eq!(hits[0]["metadata"]["source"], "articles");
}

/// Deleting an id the downstream never saw returns 404, which the sync
/// client treats as success: no retries, no failure counted.
#[tokio::test]
async fn test_delete_of_unknown_id_is_success() {
    let state = ApiState::new(Box::new(TfCosineStore::new()), None);
    let base_url = spawn_api(state).await;
    let (dispatcher, metrics, store) = http_dispatcher(&base_url, None);

    let mut checkpoint = Checkpoint::beginning();
    let outcome = dispatcher
        .dispatch(
            &mut checkpoint,
            ChangeBatch {
                events: vec![delete_event("ghost", 1)],
                next_position: Position::Sequence(1),
            },
        )
        .await
        .unwrap();

    assert_eq!(outcome.delivered, 1);
    assert_eq!(outcome.failed, 0);
    assert_eq!(metrics.delivery_retries(), 0);
    assert_eq!(store.get("articles").unwrap().position, Position::Sequence(1));
}

#[tokio::test]
async fn test_bearer_auth_enforced() {
    let state = ApiState::new(Box::new(TfCosineStore::new()), Some("secret".into()));
    let base_url = spawn_api(state).await;

    // No token: rejected.
    let response = reqwest::Client::new()
        .post(format!("{}/ingest", base_url))
        .json(&serde_json::json!({ "id": "a", "text": "t" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 401);

    // Health stays open.
    let response = reqwest::get(format!("{}/health", base_url)).await.unwrap();
    assert_eq!(response.status().as_u16(), 200);

    // The sync client with the right token gets through.
    let (dispatcher, _, _) = http_dispatcher(&base_url, Some("secret"));
    let mut checkpoint = Checkpoint::beginning();
    let outcome = dispatcher
        .dispatch(
            &mut checkpoint,
            ChangeBatch {
                events: vec![upsert_event(1, "authorized")],
                next_position: Position::Sequence(1),
            },
        )
        .await
        .unwrap();
    assert_eq!(outcome.delivered, 1);
}
