//! Page indexing pipeline
//!
//! Fetch, chunk, embed, and store. Populating is idempotent: a collection
//! that already holds chunks is never touched again.

use crate::config::Config;
use crate::error::{AskpageError, Result};
use crate::ml::embedding::{EmbeddingConfig, EmbeddingModel};
use crate::page::{Chunk, PageFetcher, extract_paragraphs};
use crate::storage::{CollectionInfo, CollectionStore};

/// Statistics from an indexing run
#[derive(Debug, Clone)]
pub struct IndexStats {
    /// Chunks now present in the collection
    pub chunk_count: usize,
    /// Chunks inserted by this run (0 when already populated)
    pub newly_indexed: usize,
    /// Wall-clock time in seconds
    pub processing_time: f64,
}

/// Indexes a single page into a persistent collection
pub struct PageIndexer {
    config: Config,
    store: CollectionStore,
    embedder: EmbeddingModel,
}

impl PageIndexer {
    /// Create a new indexer, loading the embedding model
    pub async fn new(config: Config) -> Result<Self> {
        config.validate()?;

        let store = CollectionStore::open(&config.storage.data_dir)?;
        let embedder = EmbeddingModel::new(EmbeddingConfig {
            model_name: config.model.embedding_model.clone(),
            ..Default::default()
        })
        .await?;

        Ok(Self {
            config,
            store,
            embedder,
        })
    }

    /// Create an indexer that uses the offline embedding fallback
    pub fn offline(config: Config) -> Result<Self> {
        config.validate()?;

        let store = CollectionStore::open(&config.storage.data_dir)?;
        let embedder = EmbeddingModel::offline(EmbeddingConfig {
            model_name: config.model.embedding_model.clone(),
            ..Default::default()
        })?;

        Ok(Self {
            config,
            store,
            embedder,
        })
    }

    /// Fetch the configured page and populate the collection if it is empty
    ///
    /// Skips the network round trip entirely when the collection already
    /// holds chunks.
    pub async fn ensure_indexed(&mut self) -> Result<IndexStats> {
        let start = std::time::Instant::now();
        let collection = self.config.storage.collection.clone();

        self.ensure_collection()?;
        let existing = self.store.count(&collection)?;
        if existing > 0 {
            log::info!(
                "Collection '{}' already holds {} chunks, skipping fetch",
                collection,
                existing
            );
            return Ok(IndexStats {
                chunk_count: existing,
                newly_indexed: 0,
                processing_time: start.elapsed().as_secs_f64(),
            });
        }

        let fetcher = PageFetcher::new(&self.config.page.user_agent)?;
        let html = fetcher.fetch(&self.config.page.url).await?;
        let chunks = Chunk::from_paragraphs(extract_paragraphs(&html)?);

        self.index_chunks(chunks)
    }

    /// Embed and store the given chunks if the collection is empty
    pub fn index_chunks(&mut self, chunks: Vec<Chunk>) -> Result<IndexStats> {
        let start = std::time::Instant::now();
        let collection = self.config.storage.collection.clone();

        self.ensure_collection()?;
        let existing = self.store.count(&collection)?;
        if existing > 0 {
            log::info!(
                "Collection '{}' already holds {} chunks, nothing to index",
                collection,
                existing
            );
            return Ok(IndexStats {
                chunk_count: existing,
                newly_indexed: 0,
                processing_time: start.elapsed().as_secs_f64(),
            });
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let (embeddings, failed) = self.embedder.encode_batch_parallel(&texts)?;
        if !failed.is_empty() {
            log::warn!("{} chunks received zero embeddings", failed.len());
        }

        self.store.add_chunks(&collection, &chunks, &embeddings)?;

        Ok(IndexStats {
            chunk_count: chunks.len(),
            newly_indexed: chunks.len(),
            processing_time: start.elapsed().as_secs_f64(),
        })
    }

    /// Get the collection, creating it on first use
    fn ensure_collection(&mut self) -> Result<CollectionInfo> {
        let name = self.config.storage.collection.clone();

        match self.store.get_collection(&name) {
            Ok(info) => Ok(info),
            Err(AskpageError::CollectionNotFound(_)) => {
                self.store.create_collection(&name, self.embedder.dimension())
            }
            Err(e) => Err(e),
        }
    }

    /// Access the underlying store
    pub fn store(&self) -> &CollectionStore {
        &self.store
    }
}
