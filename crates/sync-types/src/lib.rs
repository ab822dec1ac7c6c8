//! Shared domain types for the vector-sync system.
//!
//! This crate defines the normalized change event model, the position
//! ordering token, the durable checkpoint record, layered configuration,
//! and the unified error type used across the workspace.

pub mod checkpoint;
pub mod config;
pub mod error;
pub mod event;
pub mod position;

pub use checkpoint::Checkpoint;
pub use config::{Settings, SourceMode};
pub use error::SyncError;
pub use event::{ChangeEvent, ChangeKind, SourceDocument};
pub use position::Position;
