//! Runtime counters and health snapshot.
//!
//! One shared `SyncMetrics` is written by the worker and dispatcher and
//! read by the HTTP exporter. Counters are atomics; the checkpoint
//! position and state sit behind a mutex because they are not numeric.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use chrono::{DateTime, Utc};

use sync_types::Position;

use crate::worker::WorkerState;

/// Counters for one running sync worker.
#[derive(Default)]
pub struct SyncMetrics {
    events_delivered: AtomicU64,
    events_failed: AtomicU64,
    delivery_retries: AtomicU64,
    batches: AtomicU64,
    checkpoint_saves: AtomicU64,
    checkpoint_save_failures: AtomicU64,
    state: Mutex<WorkerState>,
    checkpoint_position: Mutex<Option<Position>>,
    last_batch_at: Mutex<Option<DateTime<Utc>>>,
}

/// Point-in-time view for the health endpoint.
#[derive(Debug, Clone, serde::Serialize)]
pub struct MetricsSnapshot {
    pub state: String,
    pub events_delivered: u64,
    pub events_failed: u64,
    pub delivery_retries: u64,
    pub batches: u64,
    pub checkpoint_position: Option<String>,
}

impl SyncMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_delivered(&self, count: u64) {
        self.events_delivered.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_failed(&self, count: u64) {
        self.events_failed.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_retry(&self) {
        self.delivery_retries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_batch(&self) {
        self.batches.fetch_add(1, Ordering::Relaxed);
        *self.last_batch_at.lock().unwrap() = Some(Utc::now());
    }

    pub fn record_checkpoint_save(&self) {
        self.checkpoint_saves.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_checkpoint_save_failure(&self) {
        self.checkpoint_save_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn set_state(&self, state: WorkerState) {
        *self.state.lock().unwrap() = state;
    }

    pub fn state(&self) -> WorkerState {
        *self.state.lock().unwrap()
    }

    pub fn set_checkpoint_position(&self, position: Position) {
        *self.checkpoint_position.lock().unwrap() = Some(position);
    }

    pub fn events_delivered(&self) -> u64 {
        self.events_delivered.load(Ordering::Relaxed)
    }

    pub fn events_failed(&self) -> u64 {
        self.events_failed.load(Ordering::Relaxed)
    }

    pub fn delivery_retries(&self) -> u64 {
        self.delivery_retries.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            state: self.state().to_string(),
            events_delivered: self.events_delivered(),
            events_failed: self.events_failed(),
            delivery_retries: self.delivery_retries(),
            batches: self.batches.load(Ordering::Relaxed),
            checkpoint_position: self
                .checkpoint_position
                .lock()
                .unwrap()
                .as_ref()
                .map(|p| p.to_string()),
        }
    }

    /// Render in Prometheus text exposition format.
    pub fn render_prometheus(&self) -> String {
        let mut out = String::with_capacity(1024);

        let counters = [
            (
                "sync_events_delivered_total",
                "Events successfully delivered downstream",
                self.events_delivered(),
            ),
            (
                "sync_events_failed_total",
                "Events skipped after exhausting retries or failing terminally",
                self.events_failed(),
            ),
            (
                "sync_delivery_retries_total",
                "Delivery attempts beyond the first",
                self.delivery_retries(),
            ),
            (
                "sync_batches_total",
                "Change batches dispatched",
                self.batches.load(Ordering::Relaxed),
            ),
            (
                "sync_checkpoint_saves_total",
                "Successful checkpoint persists",
                self.checkpoint_saves.load(Ordering::Relaxed),
            ),
            (
                "sync_checkpoint_save_failures_total",
                "Failed checkpoint persist attempts",
                self.checkpoint_save_failures.load(Ordering::Relaxed),
            ),
        ];

        for (name, help, value) in counters {
            out.push_str(&format!("# HELP {} {}\n", name, help));
            out.push_str(&format!("# TYPE {} counter\n", name));
            out.push_str(&format!("{} {}\n", name, value));
        }

        let current = self.state();
        out.push_str("# HELP sync_worker_state Current worker state (1 = active)\n");
        out.push_str("# TYPE sync_worker_state gauge\n");
        for state in WorkerState::ALL {
            let value = if state == current { 1 } else { 0 };
            out.push_str(&format!(
                "sync_worker_state{{state=\"{}\"}} {}\n",
                state, value
            ));
        }

        if let Some(at) = *self.last_batch_at.lock().unwrap() {
            out.push_str("# HELP sync_last_batch_timestamp_seconds Unix time of the last dispatched batch\n");
            out.push_str("# TYPE sync_last_batch_timestamp_seconds gauge\n");
            out.push_str(&format!(
                "sync_last_batch_timestamp_seconds {}\n",
                at.timestamp()
            ));
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_accumulate() {
        let metrics = SyncMetrics::new();
        metrics.record_delivered(3);
        metrics.record_delivered(2);
        metrics.record_failed(1);
        metrics.record_retry();

        assert_eq!(metrics.events_delivered(), 5);
        assert_eq!(metrics.events_failed(), 1);
        assert_eq!(metrics.delivery_retries(), 1);
    }

    #[test]
    fn test_snapshot_reflects_state() {
        let metrics = SyncMetrics::new();
        metrics.set_state(WorkerState::Steady);
        metrics.set_checkpoint_position(Position::Sequence(9));
        metrics.record_delivered(4);

        let snap = metrics.snapshot();
        assert_eq!(snap.state, "steady");
        assert_eq!(snap.events_delivered, 4);
        assert_eq!(snap.checkpoint_position.as_deref(), Some("seq:9"));
    }

    #[test]
    fn test_prometheus_render() {
        let metrics = SyncMetrics::new();
        metrics.record_delivered(7);
        metrics.set_state(WorkerState::Reconnecting);
        metrics.record_batch();

        let text = metrics.render_prometheus();
        assert!(text.contains("sync_events_delivered_total 7"));
        assert!(text.contains("sync_worker_state{state=\"reconnecting\"} 1"));
        assert!(text.contains("sync_worker_state{state=\"steady\"} 0"));
        assert!(text.contains("sync_last_batch_timestamp_seconds"));
    }
}
