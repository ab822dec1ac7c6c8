//! In-memory change source for deterministic tests.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::StreamExt;

use sync_types::{ChangeEvent, Position};

use crate::error::SourceError;
use crate::source::{ChangeBatch, ChangeSource, EventStream};

/// A change source backed by a shared vector of events.
///
/// Events must be pushed with non-decreasing `Sequence` positions; both
/// strategies serve them in order. `subscribe` yields everything after the
/// requested position and then suspends forever, like a live feed with no
/// further activity.
#[derive(Clone, Default)]
pub struct MemorySource {
    events: Arc<Mutex<Vec<ChangeEvent>>>,
    /// When set, the next call fails once with `Unavailable`.
    fail_next: Arc<Mutex<bool>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event to the feed.
    pub fn push(&self, event: ChangeEvent) {
        self.events.lock().unwrap().push(event);
    }

    /// Make the next fetch fail once, for reconnect tests.
    pub fn fail_next(&self) {
        *self.fail_next.lock().unwrap() = true;
    }

    fn take_failure(&self) -> bool {
        std::mem::take(&mut *self.fail_next.lock().unwrap())
    }

    fn after(&self, since: &Position) -> Vec<ChangeEvent> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| since.should_advance_to(&e.position))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl ChangeSource for MemorySource {
    async fn next_batch(
        &self,
        since: &Position,
        limit: usize,
    ) -> Result<ChangeBatch, SourceError> {
        if self.take_failure() {
            return Err(SourceError::Unavailable("injected failure".into()));
        }

        let mut events = self.after(since);
        events.truncate(limit);

        let next_position = events
            .last()
            .map(|e| e.position.clone())
            .unwrap_or_else(|| since.clone());

        Ok(ChangeBatch {
            events,
            next_position,
        })
    }

    async fn subscribe(&self, from: &Position) -> Result<EventStream, SourceError> {
        if self.take_failure() {
            return Err(SourceError::Unavailable("injected failure".into()));
        }

        let events = self.after(from);
        let stream = futures::stream::iter(events.into_iter().map(Ok))
            .chain(futures::stream::pending());
        Ok(stream.boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sync_types::SourceDocument;

    fn seeded() -> MemorySource {
        let source = MemorySource::new();
        for i in 1..=5u64 {
            source.push(ChangeEvent::upsert(
                SourceDocument::new(format!("doc-{}", i)),
                Position::Sequence(i),
            ));
        }
        source
    }

    #[tokio::test]
    async fn test_next_batch_from_beginning() {
        let source = seeded();
        let batch = source.next_batch(&Position::Beginning, 10).await.unwrap();
        assert_eq!(batch.events.len(), 5);
        assert_eq!(batch.next_position, Position::Sequence(5));
    }

    #[tokio::test]
    async fn test_next_batch_respects_limit() {
        let source = seeded();
        let batch = source.next_batch(&Position::Beginning, 2).await.unwrap();
        assert_eq!(batch.events.len(), 2);
        assert_eq!(batch.next_position, Position::Sequence(2));
    }

    #[tokio::test]
    async fn test_next_batch_is_strictly_after() {
        let source = seeded();
        let batch = source.next_batch(&Position::Sequence(3), 10).await.unwrap();
        assert_eq!(batch.events.len(), 2);
        for event in &batch.events {
            assert!(Position::Sequence(3).should_advance_to(&event.position));
        }
    }

    #[tokio::test]
    async fn test_empty_batch_keeps_cursor() {
        let source = seeded();
        let batch = source.next_batch(&Position::Sequence(5), 10).await.unwrap();
        assert!(batch.is_empty());
        assert_eq!(batch.next_position, Position::Sequence(5));
    }

    #[tokio::test]
    async fn test_injected_failure() {
        let source = seeded();
        source.fail_next();
        let err = source.next_batch(&Position::Beginning, 10).await.unwrap_err();
        assert!(err.is_transient());

        // Only fails once.
        assert!(source.next_batch(&Position::Beginning, 10).await.is_ok());
    }

    #[tokio::test]
    async fn test_subscribe_yields_in_order_then_pends() {
        let source = seeded();
        let mut stream = source.subscribe(&Position::Sequence(2)).await.unwrap();

        let mut positions = Vec::new();
        for _ in 0..3 {
            let event = stream.next().await.unwrap().unwrap();
            positions.push(event.position.clone());
        }
        assert_eq!(
            positions,
            vec![
                Position::Sequence(3),
                Position::Sequence(4),
                Position::Sequence(5)
            ]
        );

        // The stream suspends rather than ending.
        let pending = tokio::time::timeout(
            std::time::Duration::from_millis(50),
            stream.next(),
        )
        .await;
        assert!(pending.is_err());
    }
}
