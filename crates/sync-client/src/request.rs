//! Indexing request wire types.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Body of a `POST /ingest` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpsertRequest {
    /// Source identity; the downstream keys its index on this.
    pub id: String,

    /// Vectorizable text built from the source document.
    pub text: String,

    /// Scalar metadata stored alongside the vector.
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

/// One indexing request, derived 1:1 from a change event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "op")]
pub enum IndexRequest {
    Upsert(UpsertRequest),
    Delete { id: String },
}

impl IndexRequest {
    /// The source id this request applies to.
    pub fn source_id(&self) -> &str {
        match self {
            IndexRequest::Upsert(req) => &req.id,
            IndexRequest::Delete { id } => id,
        }
    }

    /// Whether this request deletes rather than upserts.
    pub fn is_delete(&self) -> bool {
        matches!(self, IndexRequest::Delete { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_id() {
        let upsert = IndexRequest::Upsert(UpsertRequest {
            id: "doc-1".into(),
            text: "text".into(),
            metadata: HashMap::new(),
        });
        assert_eq!(upsert.source_id(), "doc-1");
        assert!(!upsert.is_delete());

        let delete = IndexRequest::Delete { id: "doc-2".into() };
        assert_eq!(delete.source_id(), "doc-2");
        assert!(delete.is_delete());
    }

    #[test]
    fn test_upsert_serialization() {
        let mut metadata = HashMap::new();
        metadata.insert("source".to_string(), "mongo".to_string());
        let req = UpsertRequest {
            id: "doc-1".into(),
            text: "Title: T\nBody: B".into(),
            metadata,
        };
        let json = serde_json::to_string(&req).unwrap();
        assert!(json.contains("\"id\":\"doc-1\""));
        let decoded: UpsertRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, req);
    }
}
