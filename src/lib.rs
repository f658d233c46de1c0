//! # askpage
//!
//! Retrieval-augmented extractive question answering over a single web page.
//! Fetches a page, splits it into paragraph chunks, embeds and indexes them in
//! a persistent SQLite-backed vector store, then answers questions by
//! retrieving the most similar chunk and running an extractive QA model over
//! it.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use askpage::{Config, PageIndexer, QaSession};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::default();
//!
//!     // Fetch and index the page (no-op when already populated)
//!     let mut indexer = PageIndexer::new(config.clone()).await?;
//!     let stats = indexer.ensure_indexed().await?;
//!     println!("Collection holds {} chunks", stats.chunk_count);
//!
//!     // Ask a question
//!     let mut session = QaSession::new(&config).await?;
//!     let exchange = session.ask("What is the population of Singapore?")?;
//!     println!("Text: {}", exchange.context);
//!     println!("Answer: {}", exchange.answer);
//!
//!     Ok(())
//! }
//! ```

// Core modules
pub mod api;
pub mod config;
pub mod error;
pub mod ml;
pub mod page;
pub mod storage;

// Re-export main API types
pub use api::{IndexStats, PageIndexer, QaExchange, QaSession};
pub use config::Config;
pub use error::{AskpageError, Result};

// Re-export commonly used types
pub use page::Chunk;
pub use storage::{CollectionStore, RetrievedChunk};
