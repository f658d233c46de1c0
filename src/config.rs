//! Configuration for the askpage pipeline
//!
//! Defaults mirror the intended single-page setup: the Singapore Wikipedia
//! article indexed into a `default` collection under `chroma_data/`.

use crate::error::{AskpageError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Page fetching configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageConfig {
    /// URL of the page to index
    pub url: String,
    /// User agent sent with the request
    pub user_agent: String,
}

impl Default for PageConfig {
    fn default() -> Self {
        Self {
            url: "https://en.wikipedia.org/wiki/Singapore".to_string(),
            user_agent: format!("askpage/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Vector store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory holding the collection database
    pub data_dir: PathBuf,
    /// Name of the collection to populate and query
    pub collection: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("chroma_data"),
            collection: "default".to_string(),
        }
    }
}

/// Model selection and retrieval configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Sentence transformer used for embeddings
    pub embedding_model: String,
    /// Extractive question answering model
    pub qa_model: String,
    /// Number of chunks to retrieve per question
    pub top_k: usize,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            embedding_model: "sentence-transformers/all-MiniLM-L6-v2".to_string(),
            qa_model: "distilbert-base-cased-distilled-squad".to_string(),
            top_k: 1,
        }
    }
}

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Page fetching settings
    #[serde(default)]
    pub page: PageConfig,
    /// Vector store settings
    #[serde(default)]
    pub storage: StorageConfig,
    /// Model settings
    #[serde(default)]
    pub model: ModelConfig,
}

impl Config {
    /// Load configuration from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.page.url.is_empty() {
            return Err(AskpageError::Config("Page URL cannot be empty".to_string()));
        }
        if self.storage.collection.is_empty() {
            return Err(AskpageError::Config(
                "Collection name cannot be empty".to_string(),
            ));
        }
        if self.model.top_k == 0 {
            return Err(AskpageError::Config(
                "top_k must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
