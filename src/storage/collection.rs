//! SQLite-backed collection store
//!
//! Collections carry their embedding dimension and distance metric. Chunk
//! embeddings are stored as little-endian f32 blobs and queried with an exact
//! cosine scan.

use crate::error::{AskpageError, Result};
use crate::ml::embedding::Embedding;
use crate::ml::search;
use crate::page::Chunk;
use crate::storage::schema::*;
use rusqlite::{Connection, OptionalExtension, params};
use std::path::Path;

/// Metadata for a stored collection
#[derive(Debug, Clone)]
pub struct CollectionInfo {
    /// Collection name
    pub name: String,
    /// Embedding dimension
    pub dimension: usize,
    /// Distance metric identifier
    pub distance: String,
    /// Creation timestamp (RFC 3339)
    pub created_at: String,
}

/// A chunk returned from similarity search
#[derive(Debug, Clone)]
pub struct RetrievedChunk {
    /// Chunk identifier
    pub id: String,
    /// Chunk text
    pub text: String,
    /// Cosine distance from the query (lower = more similar)
    pub distance: f32,
}

/// Store of named collections in a single SQLite database
pub struct CollectionStore {
    conn: Connection,
}

impl CollectionStore {
    /// Open the store under a data directory, creating it if needed
    pub fn open<P: AsRef<Path>>(data_dir: P) -> Result<Self> {
        std::fs::create_dir_all(&data_dir)?;
        let db_path = data_dir.as_ref().join("collections.db");

        let conn = Connection::open(&db_path)
            .map_err(|e| AskpageError::Storage(format!("Failed to open database: {}", e)))?;

        let mut store = Self { conn };
        store.initialize()?;
        log::info!("Opened collection store at {:?}", db_path);
        Ok(store)
    }

    /// Create an in-memory store (for testing)
    pub fn memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| {
            AskpageError::Storage(format!("Failed to create in-memory database: {}", e))
        })?;

        let mut store = Self { conn };
        store.initialize()?;
        Ok(store)
    }

    /// Initialize database schema
    fn initialize(&mut self) -> Result<()> {
        // WAL mode for better concurrency
        let _: String = self
            .conn
            .query_row("PRAGMA journal_mode=WAL", [], |row| row.get(0))
            .map_err(|e| AskpageError::Storage(format!("Failed to enable WAL mode: {}", e)))?;

        self.conn
            .execute(CREATE_COLLECTIONS_TABLE, [])
            .map_err(|e| {
                AskpageError::Storage(format!("Failed to create collections table: {}", e))
            })?;

        self.conn
            .execute(CREATE_CHUNKS_TABLE, [])
            .map_err(|e| AskpageError::Storage(format!("Failed to create chunks table: {}", e)))?;

        self.conn
            .execute(CREATE_METADATA_TABLE, [])
            .map_err(|e| {
                AskpageError::Storage(format!("Failed to create metadata table: {}", e))
            })?;

        self.conn
            .execute_batch(CREATE_CHUNKS_INDEXES)
            .map_err(|e| AskpageError::Storage(format!("Failed to create indexes: {}", e)))?;

        self.conn
            .execute(
                "INSERT OR REPLACE INTO metadata (key, value) VALUES ('schema_version', ?)",
                params![SCHEMA_VERSION.to_string()],
            )
            .map_err(|e| AskpageError::Storage(format!("Failed to set schema version: {}", e)))?;

        log::debug!("Store initialized with schema version {}", SCHEMA_VERSION);
        Ok(())
    }

    /// Create a new collection with cosine distance
    pub fn create_collection(&mut self, name: &str, dimension: usize) -> Result<CollectionInfo> {
        let created_at = chrono::Utc::now().to_rfc3339();

        self.conn
            .execute(
                "INSERT INTO collections (name, dimension, distance, created_at) VALUES (?, ?, ?, ?)",
                params![name, dimension as i64, "cosine", created_at],
            )
            .map_err(|e| {
                AskpageError::Storage(format!("Failed to create collection '{}': {}", name, e))
            })?;

        log::info!("Created collection '{}' (dimension {})", name, dimension);
        Ok(CollectionInfo {
            name: name.to_string(),
            dimension,
            distance: "cosine".to_string(),
            created_at,
        })
    }

    /// Look up a collection by name
    ///
    /// Returns `CollectionNotFound` when the name is absent. Other storage
    /// faults propagate as their own error variants.
    pub fn get_collection(&self, name: &str) -> Result<CollectionInfo> {
        let info = self
            .conn
            .query_row(
                "SELECT name, dimension, distance, created_at FROM collections WHERE name = ?",
                params![name],
                |row| {
                    Ok(CollectionInfo {
                        name: row.get(0)?,
                        dimension: row.get::<_, i64>(1)? as usize,
                        distance: row.get(2)?,
                        created_at: row.get(3)?,
                    })
                },
            )
            .optional()
            .map_err(|e| {
                AskpageError::Storage(format!("Failed to query collection '{}': {}", name, e))
            })?;

        info.ok_or_else(|| AskpageError::CollectionNotFound(name.to_string()))
    }

    /// List all collection names
    pub fn list_collections(&self) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT name FROM collections ORDER BY name")
            .map_err(|e| AskpageError::Storage(format!("Failed to prepare query: {}", e)))?;

        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(|e| AskpageError::Storage(format!("Failed to list collections: {}", e)))?;

        let mut result = Vec::new();
        for name in names {
            result.push(
                name.map_err(|e| AskpageError::Storage(format!("Failed to read row: {}", e)))?,
            );
        }

        Ok(result)
    }

    /// Count chunks stored in a collection
    pub fn count(&self, name: &str) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row(
                "SELECT COUNT(*) FROM chunks WHERE collection = ?",
                params![name],
                |row| row.get(0),
            )
            .map_err(|e| AskpageError::Storage(format!("Failed to count chunks: {}", e)))?;

        Ok(count as usize)
    }

    /// Insert chunks and their embeddings in a single transaction
    pub fn add_chunks(
        &mut self,
        name: &str,
        chunks: &[Chunk],
        embeddings: &[Embedding],
    ) -> Result<()> {
        if chunks.len() != embeddings.len() {
            return Err(AskpageError::Storage(format!(
                "Chunk/embedding count mismatch: {} vs {}",
                chunks.len(),
                embeddings.len()
            )));
        }

        let info = self.get_collection(name)?;
        for embedding in embeddings {
            if embedding.len() != info.dimension {
                return Err(AskpageError::Storage(format!(
                    "Embedding dimension {} does not match collection dimension {}",
                    embedding.len(),
                    info.dimension
                )));
            }
        }

        let tx = self
            .conn
            .transaction()
            .map_err(|e| AskpageError::Storage(format!("Failed to start transaction: {}", e)))?;

        {
            let mut stmt = tx
                .prepare(
                    "INSERT INTO chunks (collection, id, position, text, embedding) VALUES (?, ?, ?, ?, ?)",
                )
                .map_err(|e| {
                    AskpageError::Storage(format!("Failed to prepare statement: {}", e))
                })?;

            for (position, (chunk, embedding)) in chunks.iter().zip(embeddings).enumerate() {
                stmt.execute(params![
                    name,
                    chunk.id,
                    position as i64,
                    chunk.text,
                    embedding_to_blob(embedding),
                ])
                .map_err(|e| {
                    AskpageError::Storage(format!("Failed to insert chunk {}: {}", chunk.id, e))
                })?;
            }
        }

        tx.commit()
            .map_err(|e| AskpageError::Storage(format!("Failed to commit transaction: {}", e)))?;

        log::info!("Inserted {} chunks into collection '{}'", chunks.len(), name);
        Ok(())
    }

    /// Find the `top_k` chunks closest to the query embedding
    pub fn query(&self, name: &str, query: &[f32], top_k: usize) -> Result<Vec<RetrievedChunk>> {
        // Fail loudly on a missing collection rather than returning no results
        self.get_collection(name)?;

        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, text, embedding FROM chunks WHERE collection = ? ORDER BY position",
            )
            .map_err(|e| AskpageError::Storage(format!("Failed to prepare query: {}", e)))?;

        let rows = stmt
            .query_map(params![name], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Vec<u8>>(2)?,
                ))
            })
            .map_err(|e| AskpageError::Storage(format!("Failed to query chunks: {}", e)))?;

        let mut ids_texts = Vec::new();
        let mut vectors = Vec::new();
        for row in rows {
            let (id, text, blob) =
                row.map_err(|e| AskpageError::Storage(format!("Failed to read row: {}", e)))?;
            ids_texts.push((id, text));
            vectors.push(blob_to_embedding(&blob));
        }

        let matches = search::search_exact(query, &vectors, top_k);

        Ok(matches
            .into_iter()
            .map(|m| {
                let (id, text) = ids_texts[m.index].clone();
                RetrievedChunk {
                    id,
                    text,
                    distance: m.distance,
                }
            })
            .collect())
    }

    /// Get a single chunk by id
    pub fn get_chunk(&self, name: &str, id: &str) -> Result<Option<Chunk>> {
        let chunk = self
            .conn
            .query_row(
                "SELECT id, text FROM chunks WHERE collection = ? AND id = ?",
                params![name, id],
                |row| {
                    Ok(Chunk {
                        id: row.get(0)?,
                        text: row.get(1)?,
                    })
                },
            )
            .optional()
            .map_err(|e| AskpageError::Storage(format!("Failed to query chunk: {}", e)))?;

        Ok(chunk)
    }
}

/// Encode an embedding as a little-endian f32 blob
fn embedding_to_blob(embedding: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(embedding.len() * 4);
    for &val in embedding {
        bytes.extend_from_slice(&val.to_le_bytes());
    }
    bytes
}

/// Decode a little-endian f32 blob back into an embedding
fn blob_to_embedding(blob: &[u8]) -> Embedding {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}
