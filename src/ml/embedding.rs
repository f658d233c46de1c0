//! Sentence embedding generation using the Candle framework
//!
//! This module runs real sentence transformer inference (BERT with mean
//! pooling) when model weights are available, and degrades to a deterministic
//! hashed embedding of the same dimension when they are not, so the pipeline
//! keeps working offline.

use crate::error::{AskpageError, Result};
use crate::ml::device::{DeviceType, select_device};
use crate::ml::models::ModelManager;

use candle_core::{Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config as BertConfig, DTYPE};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokenizers::Tokenizer;
use unicode_normalization::UnicodeNormalization;

/// Configuration for embedding model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Model name or path
    pub model_name: String,
    /// Embedding dimension
    pub dimension: usize,
    /// Maximum sequence length
    pub max_length: usize,
    /// Whether to normalize embeddings
    pub normalize: bool,
    /// Batch size for processing
    pub batch_size: usize,
    /// Device to use for inference
    pub device_type: DeviceType,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model_name: "sentence-transformers/all-MiniLM-L6-v2".to_string(),
            dimension: 384,
            max_length: 384,
            normalize: true,
            batch_size: 32,
            device_type: select_device(),
        }
    }
}

/// Embedding vector type
pub type Embedding = Vec<f32>;

/// Loaded BERT encoder with its tokenizer and device
struct BertEncoder {
    model: BertModel,
    tokenizer: Tokenizer,
    device: Device,
}

/// Sentence transformer embedding model
pub struct EmbeddingModel {
    /// Configuration
    config: EmbeddingConfig,
    /// Embedding cache for performance
    cache: HashMap<String, Embedding>,
    /// Model manager for loading models
    model_manager: ModelManager,
    /// Loaded encoder, when weights are available
    encoder: Option<BertEncoder>,
}

impl EmbeddingModel {
    /// Create new embedding model, loading weights from HuggingFace Hub
    pub async fn new(config: EmbeddingConfig) -> Result<Self> {
        log::info!("Initializing embedding model: {}", config.model_name);

        let mut embedding_model = Self::offline(config)?;

        if let Err(e) = embedding_model.load_model().await {
            log::warn!("Failed to load embedding model, will use fallback: {}", e);
        }

        Ok(embedding_model)
    }

    /// Create an embedding model that never loads weights
    ///
    /// Always uses the deterministic hashed embedding. Useful for offline
    /// operation and tests.
    pub fn offline(config: EmbeddingConfig) -> Result<Self> {
        let model_manager = ModelManager::new(None)?;

        Ok(Self {
            config,
            cache: HashMap::new(),
            model_manager,
            encoder: None,
        })
    }

    /// Load BERT weights and tokenizer from HuggingFace Hub
    async fn load_model(&mut self) -> Result<()> {
        log::info!("Loading BERT model: {}", self.config.model_name);

        let model_dir = self
            .model_manager
            .download_model(&self.config.model_name)
            .await?;

        let tokenizer_path = model_dir.join("tokenizer.json");
        let tokenizer = Tokenizer::from_file(&tokenizer_path).map_err(|e| {
            AskpageError::MachineLearning(format!("Failed to load tokenizer: {}", e))
        })?;

        let device = self.config.device_type.to_device()?;
        let config_json = std::fs::read_to_string(model_dir.join("config.json"))?;
        let bert_config: BertConfig = serde_json::from_str(&config_json)?;

        let weights_path = model_dir.join("model.safetensors");
        let vb = unsafe { VarBuilder::from_mmaped_safetensors(&[weights_path], DTYPE, &device)? };
        let model = BertModel::load(vb, &bert_config)?;

        self.encoder = Some(BertEncoder {
            model,
            tokenizer,
            device,
        });
        log::info!("BERT model loaded: {}", self.config.model_name);

        Ok(())
    }

    /// Whether real model inference is available
    pub fn is_ready(&self) -> bool {
        self.encoder.is_some()
    }

    /// Generate embedding for a single text
    pub fn encode(&mut self, text: &str) -> Result<Embedding> {
        if let Some(cached) = self.cache.get(text) {
            return Ok(cached.clone());
        }

        let embedding = self.encode_uncached(text)?;
        self.cache.insert(text.to_string(), embedding.clone());

        Ok(embedding)
    }

    /// Generate embeddings for multiple texts with parallel processing
    ///
    /// Returns the embeddings in input order along with any texts that failed.
    /// Failed positions carry a zero vector so ordering is preserved.
    pub fn encode_batch_parallel(
        &mut self,
        texts: &[String],
    ) -> Result<(Vec<Embedding>, Vec<String>)> {
        use rayon::prelude::*;

        let batch_size = self.config.batch_size.min(texts.len().max(1));
        let mut successful_embeddings = Vec::new();
        let mut failed_texts = Vec::new();

        for chunk in texts.chunks(batch_size) {
            let chunk_results: Vec<(usize, Result<Embedding>)> = chunk
                .par_iter()
                .enumerate()
                .map(|(local_idx, text)| (local_idx, self.encode_uncached(text)))
                .collect();

            // Update cache sequentially
            for (local_idx, result) in chunk_results {
                let text = &chunk[local_idx];
                match result {
                    Ok(embedding) => {
                        self.cache.insert(text.clone(), embedding.clone());
                        successful_embeddings.push(embedding);
                    }
                    Err(e) => {
                        log::warn!("Failed to generate embedding: {}", e);
                        failed_texts.push(text.clone());
                        successful_embeddings.push(vec![0.0; self.dimension()]);
                    }
                }
            }
        }

        Ok((successful_embeddings, failed_texts))
    }

    /// Compute an embedding without touching the cache
    fn encode_uncached(&self, text: &str) -> Result<Embedding> {
        let embedding = if let Some(encoder) = &self.encoder {
            self.encode_with_model(encoder, text)?
        } else {
            self.hashed_embedding(text)
        };

        if self.config.normalize {
            Ok(normalize_embedding(embedding))
        } else {
            Ok(embedding)
        }
    }

    /// Run BERT inference with masked mean pooling
    fn encode_with_model(&self, encoder: &BertEncoder, text: &str) -> Result<Embedding> {
        let preprocessed = preprocess(text);
        let encoding = encoder
            .tokenizer
            .encode(preprocessed.as_str(), true)
            .map_err(|e| AskpageError::MachineLearning(format!("Tokenization failed: {}", e)))?;

        let (ids, mask, type_ids) = pad_or_truncate(
            encoding.get_ids().to_vec(),
            encoding.get_attention_mask().to_vec(),
            encoding.get_type_ids().to_vec(),
            self.config.max_length,
        );

        let input_ids = Tensor::new(ids.as_slice(), &encoder.device)?.unsqueeze(0)?;
        let token_type_ids = Tensor::new(type_ids.as_slice(), &encoder.device)?.unsqueeze(0)?;
        let attention_mask = Tensor::new(mask.as_slice(), &encoder.device)?.unsqueeze(0)?;

        let hidden = encoder
            .model
            .forward(&input_ids, &token_type_ids, Some(&attention_mask))?;

        // Mean pooling over real tokens only
        let mask = attention_mask.to_dtype(DTYPE)?.unsqueeze(2)?;
        let summed = hidden.broadcast_mul(&mask)?.sum(1)?;
        let counts = mask.sum(1)?.maximum(1e-9f32)?;
        let pooled = summed.broadcast_div(&counts)?;

        Ok(pooled.squeeze(0)?.to_vec1::<f32>()?)
    }

    /// Deterministic hashed embedding used when no weights are loaded
    fn hashed_embedding(&self, text: &str) -> Embedding {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let mut embedding = vec![0.0f32; self.config.dimension];

        for (i, word) in text.split_whitespace().enumerate() {
            let mut hasher = DefaultHasher::new();
            word.hash(&mut hasher);
            let hash = hasher.finish();

            // Distribute hash bits across embedding dimensions
            for j in 0..10.min(embedding.len()) {
                let idx = (i * 10 + j) % embedding.len();
                embedding[idx] += ((hash >> (j * 6)) & 0x3F) as f32 / 64.0 - 0.5;
            }
        }

        embedding
    }

    /// Clear the embedding cache
    pub fn clear_cache(&mut self) {
        self.cache.clear();
    }

    /// Get cache size
    pub fn cache_size(&self) -> usize {
        self.cache.len()
    }

    /// Get model configuration
    pub fn config(&self) -> &EmbeddingConfig {
        &self.config
    }

    /// Get embedding dimension
    pub fn dimension(&self) -> usize {
        self.config.dimension
    }
}

/// Unicode-normalize and collapse whitespace before tokenization
fn preprocess(text: &str) -> String {
    let normalized = text.nfc().collect::<String>();
    normalized.split_whitespace().collect::<Vec<&str>>().join(" ")
}

/// Pad or truncate tokenizer output to a fixed sequence length
fn pad_or_truncate(
    mut input_ids: Vec<u32>,
    mut attention_mask: Vec<u32>,
    mut token_type_ids: Vec<u32>,
    max_len: usize,
) -> (Vec<u32>, Vec<u32>, Vec<u32>) {
    if input_ids.len() > max_len {
        input_ids.truncate(max_len);
        attention_mask.truncate(max_len);
        token_type_ids.truncate(max_len);
    } else if input_ids.len() < max_len {
        let pad_len = max_len - input_ids.len();
        input_ids.extend(vec![0; pad_len]); // 0 is typically PAD token
        attention_mask.extend(vec![0; pad_len]);
        token_type_ids.extend(vec![0; pad_len]);
    }

    (input_ids, attention_mask, token_type_ids)
}

/// Normalize embedding to unit length
pub fn normalize_embedding(mut embedding: Vec<f32>) -> Vec<f32> {
    let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 1e-12 {
        for val in &mut embedding {
            *val /= norm;
        }
    }
    embedding
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedding_config_default() {
        let config = EmbeddingConfig::default();
        assert_eq!(config.model_name, "sentence-transformers/all-MiniLM-L6-v2");
        assert_eq!(config.dimension, 384);
        assert_eq!(config.max_length, 384);
        assert!(config.normalize);
    }

    #[test]
    fn test_default_device_is_usable() {
        let config = EmbeddingConfig::default();
        assert!(config.device_type.to_device().is_ok());
    }

    #[test]
    fn test_offline_model_creation() {
        let model = EmbeddingModel::offline(EmbeddingConfig::default()).unwrap();
        assert_eq!(model.cache_size(), 0);
        assert_eq!(model.dimension(), 384);
        assert!(!model.is_ready());
    }

    #[test]
    fn test_embedding_generation_and_cache() {
        let mut model = EmbeddingModel::offline(EmbeddingConfig::default()).unwrap();

        let text = "This is a test sentence for embedding";
        let embedding = model.encode(text).unwrap();

        assert_eq!(embedding.len(), 384);
        assert_eq!(model.cache_size(), 1);

        // Second call should hit the cache and return the same result
        let embedding2 = model.encode(text).unwrap();
        assert_eq!(embedding, embedding2);
        assert_eq!(model.cache_size(), 1);
    }

    #[test]
    fn test_embedding_normalization() {
        let mut model = EmbeddingModel::offline(EmbeddingConfig::default()).unwrap();
        let embedding = model.encode("test normalization").unwrap();

        let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!(
            (norm - 1.0).abs() < 1e-6,
            "Embedding should be normalized, got norm: {}",
            norm
        );
    }

    #[test]
    fn test_embedding_deterministic() {
        let config = EmbeddingConfig::default();
        let mut model1 = EmbeddingModel::offline(config.clone()).unwrap();
        let mut model2 = EmbeddingModel::offline(config).unwrap();

        let text = "Test deterministic behavior";
        assert_eq!(model1.encode(text).unwrap(), model2.encode(text).unwrap());
    }

    #[test]
    fn test_parallel_embedding() {
        let mut model = EmbeddingModel::offline(EmbeddingConfig::default()).unwrap();

        let texts = vec![
            "First sentence".to_string(),
            "Second sentence for comparison".to_string(),
            "Third sentence with different content".to_string(),
            "Fourth sentence rounding out the batch".to_string(),
        ];

        let (embeddings, failed_texts) = model.encode_batch_parallel(&texts).unwrap();

        assert_eq!(embeddings.len(), texts.len());
        assert_eq!(failed_texts.len(), 0);
        assert_eq!(model.cache_size(), texts.len());

        assert_ne!(embeddings[0], embeddings[1]);
        assert_ne!(embeddings[1], embeddings[2]);
    }

    #[test]
    fn test_preprocess_collapses_whitespace() {
        assert_eq!(preprocess("  Hello    world!  "), "Hello world!");
        assert_eq!(preprocess("line\none\n\nline two"), "line one line two");
        assert_eq!(preprocess(""), "");
    }

    #[test]
    fn test_preprocess_applies_nfc() {
        // "e" followed by a combining acute accent composes to a single char
        let decomposed = "cafe\u{0301}";
        assert_eq!(preprocess(decomposed), "café");
    }

    #[test]
    fn test_pad_or_truncate_lengths() {
        let (ids, mask, types) = pad_or_truncate(vec![101, 7, 102], vec![1, 1, 1], vec![0, 0, 0], 6);
        assert_eq!(ids, vec![101, 7, 102, 0, 0, 0]);
        assert_eq!(mask, vec![1, 1, 1, 0, 0, 0]);
        assert_eq!(types.len(), 6);

        let (ids, mask, _) = pad_or_truncate(vec![1, 2, 3, 4, 5], vec![1; 5], vec![0; 5], 3);
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(mask, vec![1, 1, 1]);
    }

    #[test]
    fn test_normalize_embedding_values() {
        let normalized = normalize_embedding(vec![3.0, 4.0, 0.0]);

        let norm: f32 = normalized.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-6);
        assert!((normalized[0] - 0.6).abs() < 1e-6);
        assert!((normalized[1] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_empty_text_embedding() {
        let mut model = EmbeddingModel::offline(EmbeddingConfig::default()).unwrap();
        let embedding = model.encode("").unwrap();
        assert_eq!(embedding.len(), 384);
    }
}
