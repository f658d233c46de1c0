//! Error types for askpage
//!
//! This module provides comprehensive error handling for all askpage operations,
//! including page fetching, HTML parsing, ML inference, and vector storage.

use thiserror::Error;

/// Main error type for askpage operations
#[derive(Error, Debug)]
pub enum AskpageError {
    /// HTTP client errors (transport failures, non-success statuses)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// HTML parsing errors
    #[error("HTML parsing error: {0}")]
    Html(String),

    /// Machine learning model errors
    #[error("ML model error: {0}")]
    MachineLearning(String),

    /// Vector search errors
    #[error("Search error: {0}")]
    Search(String),

    /// Database/storage errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// A named collection does not exist in the store
    #[error("Collection not found: {0}")]
    CollectionNotFound(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// SQLite database errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Candle ML framework errors
    #[error("Candle ML error: {0}")]
    Candle(#[from] candle_core::Error),
}

/// Result type alias for askpage operations
pub type Result<T> = std::result::Result<T, AskpageError>;
