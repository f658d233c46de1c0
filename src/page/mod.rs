//! Page acquisition and paragraph chunking
//!
//! Fetches a single web page over HTTP and splits it into paragraph-level
//! chunks ready for embedding.

pub mod chunk;
pub mod fetch;

pub use chunk::{Chunk, extract_paragraphs};
pub use fetch::PageFetcher;
