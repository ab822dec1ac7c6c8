//! Normalized change events.
//!
//! A change event is one insert/update/delete observed at the source,
//! reduced to the fields the dispatcher needs: an identity, the kind of
//! change, the document payload (absent for deletes), and a position.

use serde::{Deserialize, Serialize};

use crate::position::Position;

/// Kind of change observed at the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    /// Document inserted, updated, or replaced.
    Upsert,
    /// Document removed.
    Delete,
}

impl std::fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChangeKind::Upsert => write!(f, "upsert"),
            ChangeKind::Delete => write!(f, "delete"),
        }
    }
}

/// A source document in its normalized form.
///
/// Only the identity field is required at the source; missing text fields
/// normalize to empty values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceDocument {
    /// Source identifier (Mongo `_id` rendered as a string).
    pub id: String,

    #[serde(default)]
    pub title: String,

    #[serde(default)]
    pub body: String,

    #[serde(default)]
    pub tags: Vec<String>,
}

impl SourceDocument {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }
}

/// One observed change, consumed exactly once by the dispatcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeEvent {
    /// Identity of the changed document at the source.
    pub source_id: String,

    /// What happened.
    pub kind: ChangeKind,

    /// Full document for upserts; `None` for deletes.
    pub document: Option<SourceDocument>,

    /// Where this change sits in the source's ordering.
    pub position: Position,
}

impl ChangeEvent {
    /// Create an upsert event for the given document.
    pub fn upsert(document: SourceDocument, position: Position) -> Self {
        Self {
            source_id: document.id.clone(),
            kind: ChangeKind::Upsert,
            document: Some(document),
            position,
        }
    }

    /// Create a delete event for the given source id.
    pub fn delete(source_id: impl Into<String>, position: Position) -> Self {
        Self {
            source_id: source_id.into(),
            kind: ChangeKind::Delete,
            document: None,
            position,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upsert_event() {
        let doc = SourceDocument::new("doc-1")
            .with_title("Title")
            .with_body("Body")
            .with_tags(vec!["a".into(), "b".into()]);
        let event = ChangeEvent::upsert(doc, Position::Sequence(1));

        assert_eq!(event.source_id, "doc-1");
        assert_eq!(event.kind, ChangeKind::Upsert);
        assert_eq!(event.document.as_ref().unwrap().title, "Title");
    }

    #[test]
    fn test_delete_event_has_no_document() {
        let event = ChangeEvent::delete("doc-1", Position::Sequence(3));
        assert_eq!(event.kind, ChangeKind::Delete);
        assert!(event.document.is_none());
    }

    #[test]
    fn test_source_document_defaults_missing_fields() {
        let doc: SourceDocument = serde_json::from_str(r#"{"id":"x"}"#).unwrap();
        assert_eq!(doc.id, "x");
        assert!(doc.title.is_empty());
        assert!(doc.tags.is_empty());
    }

    #[test]
    fn test_event_serialization_roundtrip() {
        let event = ChangeEvent::upsert(
            SourceDocument::new("doc-2").with_body("text"),
            Position::DocId("65a000000000000000000002".into()),
        );
        let json = serde_json::to_string(&event).unwrap();
        let decoded: ChangeEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded.source_id, "doc-2");
        assert_eq!(decoded.position, event.position);
    }
}
