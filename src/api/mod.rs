//! High-level pipeline API
//!
//! `PageIndexer` fetches and indexes a page into a persistent collection.
//! `QaSession` answers questions against that collection, interactively or
//! one-shot.

pub mod indexer;
pub mod session;

pub use indexer::{IndexStats, PageIndexer};
pub use session::{QaExchange, QaSession};
