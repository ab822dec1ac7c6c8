//! MongoDB change source.
//!
//! Two strategies over one collection:
//! - `next_batch` pages by `_id` cursor: ObjectIds are assigned in insertion
//!   order, so `{_id: {$gt: cursor}}` sorted ascending walks inserts exactly
//!   once. Updates and deletes are invisible to this strategy.
//! - `subscribe` opens a change stream with `full_document: updateLookup`,
//!   which observes every write and yields a resume token per event.

use async_trait::async_trait;
use futures::StreamExt;
use futures::TryStreamExt;
use mongodb::bson::oid::ObjectId;
use mongodb::bson::{doc, Bson, Document};
use mongodb::change_stream::event::{ChangeStreamEvent, OperationType, ResumeToken};
use mongodb::options::FullDocumentType;
use mongodb::{Client, Collection};
use tracing::{debug, warn};

use sync_types::{ChangeEvent, Position, SourceDocument};

use crate::error::SourceError;
use crate::source::{ChangeBatch, ChangeSource, EventStream};

/// Server error codes that invalidate a change stream resume token.
/// 260 = InvalidResumeToken, 280 = ChangeStreamFatalError,
/// 286 = ChangeStreamHistoryLost.
const RESUME_INVALID_CODES: [i32; 3] = [260, 280, 286];

/// Change source over one MongoDB collection.
pub struct MongoChangeSource {
    collection: Collection<Document>,
}

impl MongoChangeSource {
    /// Connect and bind to `db.collection`.
    ///
    /// Fails fast on an unparseable URI; an unreachable server surfaces later
    /// as `Unavailable` on the first fetch, which the worker retries.
    pub async fn connect(uri: &str, db: &str, collection: &str) -> Result<Self, SourceError> {
        let client = Client::with_uri_str(uri)
            .await
            .map_err(|e| SourceError::Unavailable(format!("mongodb connect: {e}")))?;
        debug!(db, collection, "Connected to MongoDB");
        Ok(Self {
            collection: client.database(db).collection(collection),
        })
    }

    /// Bind to an existing collection handle (shared client, tests).
    pub fn with_collection(collection: Collection<Document>) -> Self {
        Self { collection }
    }

    fn poll_filter(since: &Position) -> Result<Document, SourceError> {
        match since {
            Position::Beginning => Ok(doc! {}),
            Position::DocId(id) => {
                // Collections key `_id` on ObjectIds or plain strings.
                // `decode_document` accepts both, so the cursor it produced
                // must resume with whichever type it decoded from.
                let bound = match ObjectId::parse_str(id) {
                    Ok(oid) => Bson::ObjectId(oid),
                    Err(_) => Bson::String(id.clone()),
                };
                Ok(doc! { "_id": { "$gt": bound } })
            }
            other => Err(SourceError::BadPosition {
                expected: "Beginning or DocId",
                got: other.to_string(),
            }),
        }
    }

    fn resume_token(from: &Position) -> Result<Option<ResumeToken>, SourceError> {
        match from {
            Position::Token(raw) => {
                let token = serde_json::from_str(raw).map_err(|_| SourceError::BadPosition {
                    expected: "change stream resume token",
                    got: raw.clone(),
                })?;
                Ok(Some(token))
            }
            // A polling cursor has no equivalent stream offset. Subscribe
            // from "now"; the first delivered token replaces the cursor.
            other => {
                if !other.is_beginning() {
                    warn!(position = %other, "No stream offset for this position, subscribing from now");
                }
                Ok(None)
            }
        }
    }

    fn classify(error: mongodb::error::Error) -> SourceError {
        if let mongodb::error::ErrorKind::Command(ref cmd) = *error.kind {
            if RESUME_INVALID_CODES.contains(&(cmd.code)) {
                return SourceError::SubscriptionInvalidated(cmd.message.clone());
            }
        }
        SourceError::Unavailable(error.to_string())
    }
}

/// Render a raw document into its normalized form.
///
/// `_id` may be an ObjectId or a plain string; anything else is malformed.
/// Text fields default to empty when absent.
fn decode_document(doc: &Document) -> Result<SourceDocument, SourceError> {
    let id = match doc.get_object_id("_id") {
        Ok(oid) => oid.to_hex(),
        Err(_) => doc
            .get_str("_id")
            .map(str::to_owned)
            .map_err(|_| SourceError::Decode("document has no usable _id".into()))?,
    };

    let tags = doc
        .get_array("tags")
        .map(|arr| {
            arr.iter()
                .filter_map(|v| v.as_str().map(str::to_owned))
                .collect()
        })
        .unwrap_or_default();

    Ok(SourceDocument {
        id,
        title: doc.get_str("title").unwrap_or_default().to_owned(),
        body: doc.get_str("body").unwrap_or_default().to_owned(),
        tags,
    })
}

/// Map one change stream event to a normalized change event.
///
/// Returns `Ok(None)` for operations the pipeline ignores, and for update
/// events whose document was deleted before the lookup ran (the delete
/// event that follows covers them).
fn decode_stream_event(
    event: ChangeStreamEvent<Document>,
) -> Result<Option<ChangeEvent>, SourceError> {
    let position = Position::Token(
        serde_json::to_string(&event.id)
            .map_err(|e| SourceError::Decode(format!("resume token: {e}")))?,
    );

    match event.operation_type {
        OperationType::Insert | OperationType::Update | OperationType::Replace => {
            match event.full_document {
                Some(doc) => {
                    let document = decode_document(&doc)?;
                    Ok(Some(ChangeEvent::upsert(document, position)))
                }
                None => Ok(None),
            }
        }
        OperationType::Delete => {
            let key = event
                .document_key
                .ok_or_else(|| SourceError::Decode("delete event without document key".into()))?;
            let document = decode_document(&key)?;
            Ok(Some(ChangeEvent::delete(document.id, position)))
        }
        OperationType::Invalidate | OperationType::Drop | OperationType::DropDatabase => Err(
            SourceError::SubscriptionInvalidated(format!("{:?}", event.operation_type)),
        ),
        _ => Ok(None),
    }
}

#[async_trait]
impl ChangeSource for MongoChangeSource {
    async fn next_batch(
        &self,
        since: &Position,
        limit: usize,
    ) -> Result<ChangeBatch, SourceError> {
        let filter = Self::poll_filter(since)?;

        let docs: Vec<Document> = self
            .collection
            .find(filter)
            .sort(doc! { "_id": 1 })
            .limit(limit as i64)
            .await
            .map_err(Self::classify)?
            .try_collect()
            .await
            .map_err(Self::classify)?;

        let mut events = Vec::with_capacity(docs.len());
        for doc in &docs {
            let document = decode_document(doc)?;
            let position = Position::DocId(document.id.clone());
            events.push(ChangeEvent::upsert(document, position));
        }

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
        let resume_after = Self::resume_token(from)?;

        let mut watch = self
            .collection
            .watch()
            .full_document(FullDocumentType::UpdateLookup);
        if let Some(token) = resume_after {
            watch = watch.resume_after(token);
        }

        let stream = watch.await.map_err(Self::classify)?;
        debug!(from = %from, "Change stream opened");

        let mapped = stream.filter_map(|item| {
            let decoded = match item {
                Ok(event) => decode_stream_event(event).transpose(),
                Err(e) => Some(Err(Self::classify(e))),
            };
            futures::future::ready(decoded)
        });

        Ok(mapped.boxed())
    }
}
