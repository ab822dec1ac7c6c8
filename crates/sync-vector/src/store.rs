//! Vector store trait and types.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::VectorError;

/// A document as held by the index: identity, vectorizable text, and
/// scalar metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexedDocument {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl IndexedDocument {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            metadata: HashMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// One search result, best first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: String,
    pub document: String,
    pub metadata: HashMap<String, String>,
    /// Cosine similarity in [0, 1]; higher is more similar.
    pub score: f32,
}

/// Store statistics for the status surface.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreStats {
    pub document_count: usize,
}

/// Capability interface consumed by the HTTP layer.
///
/// `index` must be idempotent by id: indexing the same document twice
/// leaves the store in the same state as indexing it once.
pub trait VectorStore: Send + Sync {
    /// Insert or replace a document by id.
    fn index(&mut self, doc: IndexedDocument) -> Result<(), VectorError>;

    /// Return up to `k` documents ranked by similarity to `query`.
    fn search(&self, query: &str, k: usize) -> Result<Vec<SearchHit>, VectorError>;

    /// Remove a document by id. Returns `false` if it was not present.
    fn delete(&mut self, id: &str) -> Result<bool, VectorError>;

    /// Whether a document id is present.
    fn contains(&self, id: &str) -> bool;

    /// Store statistics.
    fn stats(&self) -> StoreStats;
}
