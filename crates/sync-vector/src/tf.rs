//! In-memory term-frequency store with cosine scoring.
//!
//! A local stand-in for an external vector service. Documents are embedded
//! as normalized term-frequency vectors; search ranks by cosine similarity.
//! Good enough for tests and single-node runs, not an ANN index.

use std::collections::HashMap;

use crate::error::VectorError;
use crate::store::{IndexedDocument, SearchHit, StoreStats, VectorStore};

/// Tokenize into lowercase alphanumeric terms.
fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_string())
        .collect()
}

/// Term-frequency vector with its Euclidean norm precomputed.
#[derive(Debug, Clone)]
struct TfVector {
    weights: HashMap<String, f32>,
    norm: f32,
}

impl TfVector {
    fn from_text(text: &str) -> Self {
        let mut weights: HashMap<String, f32> = HashMap::new();
        for term in tokenize(text) {
            *weights.entry(term).or_insert(0.0) += 1.0;
        }
        let norm = weights.values().map(|w| w * w).sum::<f32>().sqrt();
        Self { weights, norm }
    }

    fn cosine(&self, other: &TfVector) -> f32 {
        if self.norm == 0.0 || other.norm == 0.0 {
            return 0.0;
        }
        // Iterate the smaller vector.
        let (small, large) = if self.weights.len() <= other.weights.len() {
            (&self.weights, &other.weights)
        } else {
            (&other.weights, &self.weights)
        };
        let dot: f32 = small
            .iter()
            .filter_map(|(term, w)| large.get(term).map(|v| w * v))
            .sum();
        dot / (self.norm * other.norm)
    }
}

/// In-memory cosine store over term-frequency vectors.
#[derive(Default)]
pub struct TfCosineStore {
    docs: HashMap<String, (IndexedDocument, TfVector)>,
}

impl TfCosineStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl VectorStore for TfCosineStore {
    fn index(&mut self, doc: IndexedDocument) -> Result<(), VectorError> {
        if doc.id.is_empty() {
            return Err(VectorError::InvalidDocument("empty document id".into()));
        }
        let vector = TfVector::from_text(&doc.text);
        // Replace on re-index keeps the operation idempotent by id.
        self.docs.insert(doc.id.clone(), (doc, vector));
        Ok(())
    }

    fn search(&self, query: &str, k: usize) -> Result<Vec<SearchHit>, VectorError> {
        if query.trim().is_empty() {
            return Err(VectorError::InvalidQuery("empty query".into()));
        }
        let query_vec = TfVector::from_text(query);

        let mut hits: Vec<SearchHit> = self
            .docs
            .values()
            .map(|(doc, vector)| SearchHit {
                id: doc.id.clone(),
                document: doc.text.clone(),
                metadata: doc.metadata.clone(),
                score: query_vec.cosine(vector),
            })
            .collect();

        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(k);
        Ok(hits)
    }

    fn delete(&mut self, id: &str) -> Result<bool, VectorError> {
        Ok(self.docs.remove(id).is_some())
    }

    fn contains(&self, id: &str) -> bool {
        self.docs.contains_key(id)
    }

    fn stats(&self) -> StoreStats {
        StoreStats {
            document_count: self.docs.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with(docs: &[(&str, &str)]) -> TfCosineStore {
        let mut store = TfCosineStore::new();
        for (id, text) in docs {
            store.index(IndexedDocument::new(*id, *text)).unwrap();
        }
        store
    }

    #[test]
    fn test_index_and_search() {
        let store = store_with(&[
            ("a", "rust async runtime internals"),
            ("b", "gardening tips for spring"),
            ("c", "rust borrow checker explained"),
        ]);

        let hits = store.search("rust internals", 2).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].id, "a");
        assert!(hits[0].score > hits[1].score);
    }

    #[test]
    fn test_index_is_idempotent() {
        let mut store = store_with(&[("a", "original text")]);
        store
            .index(IndexedDocument::new("a", "original text"))
            .unwrap();

        assert_eq!(store.stats().document_count, 1);
        let hits = store.search("original", 10).unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn test_reindex_replaces_content() {
        let mut store = store_with(&[("a", "old content")]);
        store.index(IndexedDocument::new("a", "new content")).unwrap();

        let hits = store.search("new", 10).unwrap();
        assert_eq!(hits[0].document, "new content");
        assert_eq!(store.stats().document_count, 1);
    }

    #[test]
    fn test_delete() {
        let mut store = store_with(&[("a", "text")]);
        assert!(store.delete("a").unwrap());
        assert!(!store.delete("a").unwrap());
        assert!(!store.contains("a"));
    }

    #[test]
    fn test_empty_document_id_rejected() {
        let mut store = TfCosineStore::new();
        let result = store.index(IndexedDocument::new("", "text"));
        assert!(matches!(result, Err(VectorError::InvalidDocument(_))));
    }

    #[test]
    fn test_empty_query_rejected() {
        let store = store_with(&[("a", "text")]);
        assert!(matches!(
            store.search("  ", 5),
            Err(VectorError::InvalidQuery(_))
        ));
    }

    #[test]
    fn test_metadata_survives_roundtrip() {
        let mut store = TfCosineStore::new();
        store
            .index(IndexedDocument::new("a", "text").with_metadata("source", "mongo"))
            .unwrap();
        let hits = store.search("text", 1).unwrap();
        assert_eq!(hits[0].metadata.get("source"), Some(&"mongo".to_string()));
    }

    #[test]
    fn test_no_term_overlap_scores_zero() {
        let store = store_with(&[("a", "alpha beta")]);
        let hits = store.search("gamma", 1).unwrap();
        assert_eq!(hits[0].score, 0.0);
    }
}
