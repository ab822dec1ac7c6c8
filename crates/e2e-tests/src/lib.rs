//! Shared harness for end-to-end sync tests.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use sync_client::{ClientError, IndexRequest, IndexingClient};
use sync_core::{
    CheckpointStore, Dispatcher, RetryPolicy, SyncMetrics, SyncWorker, WorkerConfig,
};
use sync_source::MemorySource;
use sync_types::{ChangeEvent, Position, SourceDocument, SourceMode};

/// Indexing client double that records deliveries in order.
///
/// Failures can be scripted: the next `n` calls fail retryably, or ids can
/// be marked so every delivery for them fails terminally.
#[derive(Default)]
pub struct RecordingClient {
    delivered: Mutex<Vec<IndexRequest>>,
    fail_retryable: AtomicU32,
    terminal_ids: Mutex<HashSet<String>>,
}

impl RecordingClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `n` deliveries with a retryable error.
    pub fn fail_next_retryable(&self, n: u32) {
        self.fail_retryable.store(n, Ordering::SeqCst);
    }

    /// Fail every delivery for `id` with a terminal error.
    pub fn mark_terminal(&self, id: impl Into<String>) {
        self.terminal_ids.lock().unwrap().insert(id.into());
    }

    pub fn delivered(&self) -> Vec<IndexRequest> {
        self.delivered.lock().unwrap().clone()
    }

    /// Source ids in delivery order.
    pub fn delivered_ids(&self) -> Vec<String> {
        self.delivered
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.source_id().to_string())
            .collect()
    }
}

#[async_trait]
impl IndexingClient for RecordingClient {
    async fn deliver(&self, request: &IndexRequest) -> Result<(), ClientError> {
        if self
            .terminal_ids
            .lock()
            .unwrap()
            .contains(request.source_id())
        {
            return Err(ClientError::Terminal {
                status: Some(422),
                message: "rejected".into(),
            });
        }

        let remaining = self.fail_retryable.load(Ordering::SeqCst);
        if remaining > 0 {
            self.fail_retryable.store(remaining - 1, Ordering::SeqCst);
            return Err(ClientError::Retryable("scripted outage".into()));
        }

        self.delivered.lock().unwrap().push(request.clone());
        Ok(())
    }
}

/// Retry policy with millisecond delays so tests stay fast.
pub fn fast_retry() -> RetryPolicy {
    RetryPolicy::new(Duration::from_millis(20), Duration::from_millis(200), 3)
}

/// Worker config tuned for tests.
pub fn fast_worker_config(mode: SourceMode) -> WorkerConfig {
    WorkerConfig {
        partition: "articles".into(),
        mode,
        batch_size: 10,
        poll_interval: Duration::from_millis(10),
        queue_capacity: 4,
        shutdown_timeout: Duration::from_secs(2),
        reconnect: RetryPolicy::new(
            Duration::from_millis(5),
            Duration::from_millis(50),
            u32::MAX,
        ),
        batch_idle: Duration::from_millis(10),
    }
}

pub fn upsert_event(n: u64, body: &str) -> ChangeEvent {
    ChangeEvent::upsert(
        SourceDocument::new(format!("doc-{}", n))
            .with_title(format!("Document {}", n))
            .with_body(body),
        Position::Sequence(n),
    )
}

pub fn delete_event(id: &str, n: u64) -> ChangeEvent {
    ChangeEvent::delete(id, Position::Sequence(n))
}

/// Everything a pipeline test needs, wired together.
pub struct TestPipeline {
    pub source: MemorySource,
    pub client: Arc<RecordingClient>,
    pub store: Arc<dyn CheckpointStore>,
    pub metrics: Arc<SyncMetrics>,
    pub cancel: CancellationToken,
    pub worker: SyncWorker,
}

impl TestPipeline {
    pub fn new(
        source: MemorySource,
        client: Arc<RecordingClient>,
        store: Arc<dyn CheckpointStore>,
        mode: SourceMode,
    ) -> Self {
        let metrics = Arc::new(SyncMetrics::new());
        let cancel = CancellationToken::new();
        let config = fast_worker_config(mode);

        let dispatcher = Dispatcher::new(
            client.clone(),
            store.clone(),
            config.partition.clone(),
            fast_retry(),
            metrics.clone(),
            cancel.clone(),
        );
        let worker = SyncWorker::new(
            Arc::new(source.clone()),
            dispatcher,
            store.clone(),
            config,
            metrics.clone(),
            cancel.clone(),
        );

        Self {
            source,
            client,
            store,
            metrics,
            cancel,
            worker,
        }
    }

    /// Run the worker for `run_for`, then shut it down and wait.
    pub async fn run_for(self, run_for: Duration) -> RunResult {
        let handle = tokio::spawn(self.worker.run());
        tokio::time::sleep(run_for).await;
        self.cancel.cancel();
        handle.await.unwrap().unwrap();

        RunResult {
            client: self.client,
            store: self.store,
            metrics: self.metrics,
        }
    }
}

pub struct RunResult {
    pub client: Arc<RecordingClient>,
    pub store: Arc<dyn CheckpointStore>,
    pub metrics: Arc<SyncMetrics>,
}
