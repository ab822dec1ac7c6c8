//! Vector store wrapper for the indexing surface.
//!
//! The sync core never depends on this crate; it is consumed only by the
//! HTTP layer. The real similarity engine is an external concern, so the
//! interface here is the minimal capability set the service needs
//! (`index`, `search`, `delete`) plus an in-memory term-frequency
//! implementation for local runs and tests.

pub mod error;
pub mod store;
pub mod tf;

pub use error::VectorError;
pub use store::{IndexedDocument, SearchHit, StoreStats, VectorStore};
pub use tf::TfCosineStore;
