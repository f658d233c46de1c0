//! Persistent vector storage
//!
//! Named collections of (id, text, embedding) rows in an embedded SQLite
//! database. A collection is created once and populated at most once.

pub mod collection;
pub mod schema;

pub use collection::{CollectionInfo, CollectionStore, RetrievedChunk};
pub use schema::SCHEMA_VERSION;
