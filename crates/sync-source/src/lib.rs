//! Change source adapters.
//!
//! A change source abstracts "get the next changes" over two strategies:
//! cursor polling and a native change-notification subscription. Both
//! produce the same normalized `ChangeEvent` sequence, so the dispatcher
//! never knows which strategy is active.

pub mod error;
pub mod memory;
pub mod mongo;
pub mod source;

pub use error::SourceError;
pub use memory::MemorySource;
pub use mongo::MongoChangeSource;
pub use source::{ChangeBatch, ChangeSource, EventStream};
