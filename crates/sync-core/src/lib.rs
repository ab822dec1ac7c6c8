//! Synchronization core.
//!
//! Ties a change source to an indexing client: the worker fetches ordered
//! change batches, the dispatcher delivers them downstream with retries,
//! and a durable checkpoint records the furthest fully-resolved position
//! so a restart resumes instead of replaying.

pub mod dispatch;
pub mod error;
pub mod metrics;
pub mod retry;
pub mod store;
pub mod worker;

pub use dispatch::{BatchOutcome, Dispatcher};
pub use error::CoreError;
pub use metrics::SyncMetrics;
pub use retry::RetryPolicy;
pub use store::{CheckpointStore, FileCheckpointStore, MemoryCheckpointStore};
pub use worker::{SyncWorker, WorkerConfig, WorkerState};
