//! Durable checkpoint record.
//!
//! A checkpoint is the single authority for "everything at or before this
//! position has been fully processed". It only ever advances and survives
//! process restarts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::SyncError;
use crate::position::Position;

/// The furthest fully-processed position for one partition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Last position fully resolved (delivered or terminally failed).
    pub position: Position,

    /// When the checkpoint last moved (milliseconds since epoch on disk).
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub updated_at: DateTime<Utc>,

    /// Total events resolved since this checkpoint was created.
    pub processed_count: u64,

    /// When this checkpoint was first created.
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
}

impl Checkpoint {
    /// Fresh checkpoint at the beginning sentinel (first run).
    pub fn beginning() -> Self {
        let now = Utc::now();
        Self {
            position: Position::Beginning,
            updated_at: now,
            processed_count: 0,
            created_at: now,
        }
    }

    /// Checkpoint at a specific position.
    pub fn at(position: Position) -> Self {
        let now = Utc::now();
        Self {
            position,
            updated_at: now,
            processed_count: 0,
            created_at: now,
        }
    }

    /// Advance to `position` if it moves the checkpoint forward.
    ///
    /// Returns `true` when the checkpoint moved. Positions that compare at
    /// or before the current one are ignored, preserving monotonicity.
    pub fn advance(&mut self, position: &Position, items_resolved: u64) -> bool {
        if !self.position.should_advance_to(position) {
            return false;
        }
        self.position = position.clone();
        self.updated_at = Utc::now();
        self.processed_count += items_resolved;
        true
    }

    /// Serialize to JSON bytes for persistence.
    pub fn to_bytes(&self) -> Result<Vec<u8>, SyncError> {
        serde_json::to_vec(self).map_err(SyncError::from)
    }

    /// Deserialize from JSON bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SyncError> {
        serde_json::from_slice(bytes).map_err(SyncError::from)
    }
}
