//! Batch dispatcher.
//!
//! Delivers one batch at a time, events in position order, one in flight.
//! Retryable failures back off and retry up to the attempt ceiling; a
//! terminal failure or an exhausted event is logged, counted, and skipped
//! so one poison document cannot stall the pipeline. The checkpoint
//! advances only after every event in the batch is resolved, and the
//! persist must succeed (or be retried until it does) before the batch
//! counts as complete.

use std::collections::HashMap;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use sync_client::{IndexRequest, IndexingClient, UpsertRequest};
use sync_source::ChangeBatch;
use sync_types::{ChangeEvent, ChangeKind, Checkpoint, Position, SourceDocument};

use crate::error::CoreError;
use crate::metrics::SyncMetrics;
use crate::retry::RetryPolicy;
use crate::store::CheckpointStore;

/// Result of dispatching one batch.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    /// Events delivered downstream.
    pub delivered: u64,
    /// Events resolved by skipping (terminal or exhausted).
    pub failed: u64,
    /// Whether the checkpoint moved.
    pub checkpoint_moved: bool,
    /// Whether shutdown interrupted the batch before every event resolved.
    pub interrupted: bool,
}

enum Delivery {
    Delivered,
    Skipped,
    Interrupted,
}

/// Build the flattened text the downstream vectorizes.
pub fn render_text(doc: &SourceDocument) -> String {
    format!(
        "Title: {}\nBody: {}\nTags: {}",
        doc.title,
        doc.body,
        doc.tags.join(", ")
    )
}

/// Map a change event to its indexing request.
///
/// `source` labels where the document came from (the partition name) and
/// travels in the metadata so the index can be filtered by origin.
pub fn to_request(event: &ChangeEvent, source: &str) -> IndexRequest {
    match event.kind {
        ChangeKind::Delete => IndexRequest::Delete {
            id: event.source_id.clone(),
        },
        ChangeKind::Upsert => {
            let doc = event
                .document
                .clone()
                .unwrap_or_else(|| SourceDocument::new(event.source_id.clone()));
            let mut metadata = HashMap::new();
            metadata.insert("source".to_string(), source.to_string());
            if !doc.title.is_empty() {
                metadata.insert("title".to_string(), doc.title.clone());
            }
            if !doc.tags.is_empty() {
                metadata.insert("tags".to_string(), doc.tags.join(","));
            }
            IndexRequest::Upsert(UpsertRequest {
                id: doc.id.clone(),
                text: render_text(&doc),
                metadata,
            })
        }
    }
}

/// Delivers batches downstream and owns checkpoint persistence.
pub struct Dispatcher {
    client: Arc<dyn IndexingClient>,
    store: Arc<dyn CheckpointStore>,
    partition: String,
    retry: RetryPolicy,
    metrics: Arc<SyncMetrics>,
    cancel: CancellationToken,
}

impl Dispatcher {
    pub fn new(
        client: Arc<dyn IndexingClient>,
        store: Arc<dyn CheckpointStore>,
        partition: impl Into<String>,
        retry: RetryPolicy,
        metrics: Arc<SyncMetrics>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            client,
            store,
            partition: partition.into(),
            retry,
            metrics,
            cancel,
        }
    }

    /// Dispatch one batch and advance the checkpoint.
    ///
    /// On shutdown mid-batch the checkpoint advances only to the last
    /// resolved event, so unresolved events are re-fetched next run.
    pub async fn dispatch(
        &self,
        checkpoint: &mut Checkpoint,
        batch: ChangeBatch,
    ) -> Result<BatchOutcome, CoreError> {
        let mut outcome = BatchOutcome::default();
        let mut last_resolved: Option<Position> = None;

        for event in &batch.events {
            match self.deliver_with_retry(event).await {
                Delivery::Delivered => {
                    outcome.delivered += 1;
                    last_resolved = Some(event.position.clone());
                }
                Delivery::Skipped => {
                    outcome.failed += 1;
                    self.metrics.record_failed(1);
                    last_resolved = Some(event.position.clone());
                }
                Delivery::Interrupted => {
                    outcome.interrupted = true;
                    break;
                }
            }
        }

        self.metrics.record_delivered(outcome.delivered);
        self.metrics.record_batch();

        let target = if outcome.interrupted {
            last_resolved
        } else {
            Some(batch.next_position.clone())
        };

        if let Some(position) = target {
            let resolved = outcome.delivered + outcome.failed;
            if checkpoint.advance(&position, resolved) {
                self.persist(checkpoint).await?;
                outcome.checkpoint_moved = true;
            }
        }

        debug!(
            delivered = outcome.delivered,
            failed = outcome.failed,
            position = %checkpoint.position,
            "Batch resolved"
        );

        Ok(outcome)
    }

    async fn deliver_with_retry(&self, event: &ChangeEvent) -> Delivery {
        let request = to_request(event, &self.partition);

        for attempt in 1..=self.retry.max_attempts {
            match self.client.deliver(&request).await {
                Ok(()) => return Delivery::Delivered,
                Err(e) if e.is_retryable() => {
                    let delay = match self.retry.delay_before(attempt + 1) {
                        Some(delay) => delay,
                        None => {
                            warn!(
                                source_id = %event.source_id,
                                kind = %event.kind,
                                attempts = attempt,
                                error = %e,
                                "Exhausted delivery attempts, skipping event"
                            );
                            return Delivery::Skipped;
                        }
                    };
                    warn!(
                        source_id = %event.source_id,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Delivery failed, retrying"
                    );
                    self.metrics.record_retry();
                    tokio::select! {
                        _ = self.cancel.cancelled() => return Delivery::Interrupted,
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
                Err(e) => {
                    warn!(
                        source_id = %event.source_id,
                        kind = %event.kind,
                        error = %e,
                        "Terminal delivery failure, skipping event"
                    );
                    return Delivery::Skipped;
                }
            }
        }

        Delivery::Skipped
    }

    /// Persist the checkpoint, retrying until it lands.
    ///
    /// A batch is not complete until its checkpoint is durable; only
    /// shutdown breaks the loop.
    async fn persist(&self, checkpoint: &Checkpoint) -> Result<(), CoreError> {
        let mut failures = 0u32;
        loop {
            match self.store.save(&self.partition, checkpoint) {
                Ok(()) => {
                    self.metrics.record_checkpoint_save();
                    self.metrics
                        .set_checkpoint_position(checkpoint.position.clone());
                    if failures > 0 {
                        info!(failures, "Checkpoint persisted after retries");
                    }
                    return Ok(());
                }
                Err(e) => {
                    failures += 1;
                    self.metrics.record_checkpoint_save_failure();
                    let delay = self.retry.reconnect_delay(failures);
                    warn!(
                        partition = %self.partition,
                        failures,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Checkpoint persist failed, retrying"
                    );
                    tokio::select! {
                        _ = self.cancel.cancelled() => {
                            return Err(CoreError::CheckpointStore(
                                "persist interrupted by shutdown".into(),
                            ));
                        }
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }
    }
}
