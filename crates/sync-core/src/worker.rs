//! Sync worker lifecycle.
//!
//! The worker runs two halves connected by a bounded channel: a fetch
//! task that pulls ordered batches from the change source (polling or
//! streaming), and a dispatch loop that delivers them and moves the
//! checkpoint. The bounded channel is the backpressure seam: when
//! delivery is slow the fetcher blocks instead of buffering unboundedly.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use futures::StreamExt;

use sync_source::{ChangeBatch, ChangeSource, SourceError};
use sync_types::{Checkpoint, Position, Settings, SourceMode};

use crate::dispatch::Dispatcher;
use crate::error::CoreError;
use crate::metrics::SyncMetrics;
use crate::retry::RetryPolicy;
use crate::store::CheckpointStore;

/// Observable lifecycle state of the worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WorkerState {
    #[default]
    Starting,
    LoadingCheckpoint,
    Steady,
    Reconnecting,
    Stopped,
}

impl WorkerState {
    pub const ALL: [WorkerState; 5] = [
        WorkerState::Starting,
        WorkerState::LoadingCheckpoint,
        WorkerState::Steady,
        WorkerState::Reconnecting,
        WorkerState::Stopped,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            WorkerState::Starting => "starting",
            WorkerState::LoadingCheckpoint => "loading_checkpoint",
            WorkerState::Steady => "steady",
            WorkerState::Reconnecting => "reconnecting",
            WorkerState::Stopped => "stopped",
        }
    }
}

impl std::fmt::Display for WorkerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tunables for one worker.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Checkpoint partition, normally the source collection name.
    pub partition: String,
    pub mode: SourceMode,
    pub batch_size: usize,
    /// Sleep between polls that return nothing.
    pub poll_interval: Duration,
    /// Bounded batch queue depth between fetch and dispatch.
    pub queue_capacity: usize,
    /// How long shutdown waits for queued batches to drain.
    pub shutdown_timeout: Duration,
    /// Backoff curve for source reconnects.
    pub reconnect: RetryPolicy,
    /// How long the stream side waits for more events before flushing a
    /// partial batch.
    pub batch_idle: Duration,
}

impl WorkerConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        let base = Duration::from_millis(settings.backoff_base_ms);
        let cap = Duration::from_millis(settings.backoff_cap_ms);
        Self {
            partition: settings.mongo_collection.clone(),
            mode: settings.mode,
            batch_size: settings.batch_size,
            poll_interval: Duration::from_secs(settings.poll_interval_secs),
            queue_capacity: settings.queue_capacity,
            shutdown_timeout: Duration::from_secs(settings.shutdown_timeout_secs),
            reconnect: RetryPolicy::new(base, cap, u32::MAX).with_jitter(true),
            batch_idle: Duration::from_millis(25),
        }
    }
}

/// Long-running synchronization loop over one source partition.
pub struct SyncWorker {
    source: Arc<dyn ChangeSource>,
    dispatcher: Dispatcher,
    store: Arc<dyn CheckpointStore>,
    config: WorkerConfig,
    metrics: Arc<SyncMetrics>,
    cancel: CancellationToken,
}

impl SyncWorker {
    pub fn new(
        source: Arc<dyn ChangeSource>,
        dispatcher: Dispatcher,
        store: Arc<dyn CheckpointStore>,
        config: WorkerConfig,
        metrics: Arc<SyncMetrics>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            source,
            dispatcher,
            store,
            config,
            metrics,
            cancel,
        }
    }

    /// Run until the cancellation token fires or the source fails fatally.
    ///
    /// Always attempts a final checkpoint save on the way out.
    pub async fn run(self) -> Result<(), CoreError> {
        self.metrics.set_state(WorkerState::LoadingCheckpoint);

        let mut checkpoint = match self.store.load(&self.config.partition)? {
            Some(checkpoint) => {
                info!(
                    partition = %self.config.partition,
                    position = %checkpoint.position,
                    processed = checkpoint.processed_count,
                    "Resuming from checkpoint"
                );
                checkpoint
            }
            None => {
                info!(
                    partition = %self.config.partition,
                    "No checkpoint found, starting from the beginning"
                );
                Checkpoint::beginning()
            }
        };
        self.metrics
            .set_checkpoint_position(checkpoint.position.clone());

        let (tx, mut rx) = mpsc::channel::<ChangeBatch>(self.config.queue_capacity);
        let fetcher = tokio::spawn(fetch_loop(
            self.source.clone(),
            self.config.clone(),
            checkpoint.position.clone(),
            tx,
            self.metrics.clone(),
            self.cancel.clone(),
        ));

        info!(mode = %self.config.mode, batch_size = self.config.batch_size, "Worker started");

        loop {
            let batch = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                batch = rx.recv() => match batch {
                    Some(batch) => batch,
                    // Fetcher stopped: either cancelled or fatally failed.
                    None => break,
                },
            };

            if let Err(e) = self.dispatcher.dispatch(&mut checkpoint, batch).await {
                if self.cancel.is_cancelled() {
                    break;
                }
                self.metrics.set_state(WorkerState::Stopped);
                return Err(e);
            }
        }

        // Drain what the fetcher already queued, bounded by the shutdown
        // window. Unresolved events are covered by the checkpoint.
        debug!("Draining queued batches");
        let drain = async {
            while let Some(batch) = rx.recv().await {
                if self.dispatcher.dispatch(&mut checkpoint, batch).await.is_err() {
                    break;
                }
            }
        };
        if tokio::time::timeout(self.config.shutdown_timeout, drain)
            .await
            .is_err()
        {
            warn!("Shutdown timeout reached with batches still queued");
        }

        if let Err(e) = self.store.save(&self.config.partition, &checkpoint) {
            warn!(error = %e, "Final checkpoint save failed");
        }

        // A fetcher blocked in `send` must see the channel close before it
        // can observe cancellation.
        drop(rx);
        let _ = fetcher.await;
        self.metrics.set_state(WorkerState::Stopped);
        info!(
            position = %checkpoint.position,
            processed = checkpoint.processed_count,
            "Worker stopped"
        );
        Ok(())
    }
}

/// True when the sleep was interrupted by cancellation.
async fn sleep_or_cancel(duration: Duration, cancel: &CancellationToken) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => true,
        _ = tokio::time::sleep(duration) => false,
    }
}

async fn fetch_loop(
    source: Arc<dyn ChangeSource>,
    config: WorkerConfig,
    start: Position,
    tx: mpsc::Sender<ChangeBatch>,
    metrics: Arc<SyncMetrics>,
    cancel: CancellationToken,
) {
    match config.mode {
        SourceMode::Poll => poll_loop(source, config, start, tx, metrics, cancel).await,
        SourceMode::Stream => stream_loop(source, config, start, tx, metrics, cancel).await,
    }
}

async fn poll_loop(
    source: Arc<dyn ChangeSource>,
    config: WorkerConfig,
    start: Position,
    tx: mpsc::Sender<ChangeBatch>,
    metrics: Arc<SyncMetrics>,
    cancel: CancellationToken,
) {
    let mut cursor = start;
    let mut failures = 0u32;

    while !cancel.is_cancelled() {
        match source.next_batch(&cursor, config.batch_size).await {
            Ok(batch) => {
                failures = 0;
                metrics.set_state(WorkerState::Steady);

                let empty = batch.is_empty();
                cursor = batch.next_position.clone();

                if !empty {
                    // Blocks when the queue is full: backpressure.
                    if tx.send(batch).await.is_err() {
                        break;
                    }
                } else if sleep_or_cancel(config.poll_interval, &cancel).await {
                    break;
                }
            }
            Err(e) if e.is_transient() => {
                failures += 1;
                metrics.set_state(WorkerState::Reconnecting);
                let delay = config.reconnect.reconnect_delay(failures);
                warn!(
                    error = %e,
                    failures,
                    delay_ms = delay.as_millis() as u64,
                    "Source unavailable, backing off"
                );
                if sleep_or_cancel(delay, &cancel).await {
                    break;
                }
            }
            Err(e) => {
                error!(error = %e, "Source failed fatally, stopping fetch");
                break;
            }
        }
    }
}

async fn stream_loop(
    source: Arc<dyn ChangeSource>,
    config: WorkerConfig,
    start: Position,
    tx: mpsc::Sender<ChangeBatch>,
    metrics: Arc<SyncMetrics>,
    cancel: CancellationToken,
) {
    let mut position = start;
    let mut failures = 0u32;

    'subscribe: while !cancel.is_cancelled() {
        let mut stream = match source.subscribe(&position).await {
            Ok(stream) => {
                failures = 0;
                metrics.set_state(WorkerState::Steady);
                stream
            }
            Err(SourceError::SubscriptionInvalidated(msg)) => {
                warn!(
                    reason = %msg,
                    "Resume position invalidated, restarting from the beginning; \
                     already-synced events may be re-delivered"
                );
                position = Position::Beginning;
                continue;
            }
            Err(e) if e.is_transient() => {
                failures += 1;
                metrics.set_state(WorkerState::Reconnecting);
                let delay = config.reconnect.reconnect_delay(failures);
                warn!(error = %e, failures, "Subscribe failed, backing off");
                if sleep_or_cancel(delay, &cancel).await {
                    break;
                }
                continue;
            }
            Err(e) => {
                error!(error = %e, "Subscribe failed fatally, stopping fetch");
                break;
            }
        };

        loop {
            let first = tokio::select! {
                _ = cancel.cancelled() => break 'subscribe,
                item = stream.next() => item,
            };

            let event = match first {
                Some(Ok(event)) => event,
                Some(Err(SourceError::SubscriptionInvalidated(msg))) => {
                    warn!(
                        reason = %msg,
                        "Stream invalidated, restarting from the beginning; \
                         already-synced events may be re-delivered"
                    );
                    position = Position::Beginning;
                    continue 'subscribe;
                }
                Some(Err(e)) => {
                    failures += 1;
                    metrics.set_state(WorkerState::Reconnecting);
                    let delay = config.reconnect.reconnect_delay(failures);
                    warn!(error = %e, failures, "Stream error, resubscribing");
                    if sleep_or_cancel(delay, &cancel).await {
                        break 'subscribe;
                    }
                    continue 'subscribe;
                }
                None => {
                    metrics.set_state(WorkerState::Reconnecting);
                    warn!("Stream ended, resubscribing");
                    continue 'subscribe;
                }
            };

            // Gather whatever arrives within the idle window into one
            // batch. An error or end mid-gather flushes what we have and
            // resubscribes from the last gathered position.
            let mut events = vec![event];
            let mut resubscribe = false;
            while events.len() < config.batch_size {
                match tokio::time::timeout(config.batch_idle, stream.next()).await {
                    Ok(Some(Ok(event))) => events.push(event),
                    Ok(_) => {
                        resubscribe = true;
                        break;
                    }
                    Err(_) => break,
                }
            }

            if let Some(last) = events.last() {
                position = last.position.clone();
            }
            let batch = ChangeBatch {
                events,
                next_position: position.clone(),
            };
            if tx.send(batch).await.is_err() {
                break 'subscribe;
            }
            if resubscribe {
                continue 'subscribe;
            }
        }
    }
}
