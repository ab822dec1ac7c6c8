//! Change source trait.

use async_trait::async_trait;
use futures::stream::BoxStream;

use sync_types::{ChangeEvent, Position};

use crate::error::SourceError;

/// A lazy, ordered sequence of change events.
///
/// Infinite for live subscriptions: the stream suspends between events
/// rather than ending. A stream error ends consumption; the caller
/// re-subscribes from the last delivered position.
pub type EventStream = BoxStream<'static, Result<ChangeEvent, SourceError>>;

/// One batch of changes, in ascending position order.
#[derive(Debug, Clone)]
pub struct ChangeBatch {
    /// Events strictly after the requested position. May be empty.
    pub events: Vec<ChangeEvent>,

    /// Position to pass to the next `next_batch` call. Equal to the
    /// requested position when the batch is empty.
    pub next_position: Position,
}

impl ChangeBatch {
    /// An empty batch that leaves the cursor where it was.
    pub fn empty(at: Position) -> Self {
        Self {
            events: Vec::new(),
            next_position: at,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// Adapter over an upstream mutable store's change feed.
///
/// Implementations must never emit an event whose position is at or
/// before the position passed in.
#[async_trait]
pub trait ChangeSource: Send + Sync {
    /// Fetch up to `limit` changes strictly after `since`, ascending.
    ///
    /// An empty batch is a valid, frequent result.
    async fn next_batch(
        &self,
        since: &Position,
        limit: usize,
    ) -> Result<ChangeBatch, SourceError>;

    /// Open a live subscription starting after `from`.
    ///
    /// `Position::Beginning` subscribes from "now" for sources whose
    /// notification feed has no history. A `SubscriptionInvalidated` error
    /// means the resumption token expired; the caller falls back to
    /// `Beginning` and logs the potential re-processing.
    async fn subscribe(&self, from: &Position) -> Result<EventStream, SourceError>;
}
