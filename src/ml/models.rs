//! Model management for the askpage ML system
//!
//! This module handles downloading, caching, and managing ML models
//! from HuggingFace Hub.

use crate::error::{AskpageError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Types of models supported
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ModelType {
    /// Sentence transformer for embeddings
    SentenceTransformer,
    /// Extractive question answering head on a transformer encoder
    QuestionAnswering,
}

/// Model metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    /// Model name/identifier
    pub name: String,
    /// Model type
    pub model_type: ModelType,
    /// Local path to model files
    pub local_path: Option<PathBuf>,
    /// HuggingFace model hub identifier
    pub hub_id: String,
    /// Embedding/hidden dimension
    pub dimension: usize,
    /// Maximum sequence length
    pub max_length: usize,
    /// Whether model files are cached locally
    pub cached: bool,
}

/// Model manager for downloading and caching models
pub struct ModelManager {
    /// Cache directory for models
    cache_dir: PathBuf,
    /// Available models
    models: HashMap<String, ModelInfo>,
}

impl ModelManager {
    /// Create new model manager
    pub fn new(cache_dir: Option<PathBuf>) -> Result<Self> {
        let cache_dir = cache_dir.unwrap_or_else(|| {
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
            PathBuf::from(home)
                .join(".cache")
                .join("askpage")
                .join("models")
        });

        std::fs::create_dir_all(&cache_dir)?;

        let mut manager = Self {
            cache_dir,
            models: HashMap::new(),
        };

        manager.register_default_models();

        Ok(manager)
    }

    /// Register default models
    fn register_default_models(&mut self) {
        let mini_lm = ModelInfo {
            name: "all-MiniLM-L6-v2".to_string(),
            model_type: ModelType::SentenceTransformer,
            local_path: None,
            hub_id: "sentence-transformers/all-MiniLM-L6-v2".to_string(),
            dimension: 384,
            max_length: 384,
            cached: false,
        };

        // Register with both short and full names for compatibility
        self.models
            .insert("all-MiniLM-L6-v2".to_string(), mini_lm.clone());
        self.models.insert(
            "sentence-transformers/all-MiniLM-L6-v2".to_string(),
            mini_lm,
        );

        let distilbert_squad = ModelInfo {
            name: "distilbert-base-cased-distilled-squad".to_string(),
            model_type: ModelType::QuestionAnswering,
            local_path: None,
            hub_id: "distilbert-base-cased-distilled-squad".to_string(),
            dimension: 768,
            max_length: 384,
            cached: false,
        };

        self.models.insert(
            "distilbert-base-cased-distilled-squad".to_string(),
            distilbert_squad,
        );
    }

    /// Get model info by name
    pub fn get_model(&self, name: &str) -> Option<&ModelInfo> {
        self.models.get(name)
    }

    /// List available models
    pub fn list_models(&self) -> Vec<&ModelInfo> {
        self.models.values().collect()
    }

    /// Check if model is cached locally
    pub fn is_cached(&self, name: &str) -> bool {
        if let Some(model) = self.models.get(name) {
            model.cached && model.local_path.is_some()
        } else {
            false
        }
    }

    /// Get cache directory
    pub fn cache_dir(&self) -> &PathBuf {
        &self.cache_dir
    }

    /// Download and cache model from HuggingFace Hub
    pub async fn download_model(&mut self, name: &str) -> Result<PathBuf> {
        let model = self
            .models
            .get_mut(name)
            .ok_or_else(|| AskpageError::MachineLearning(format!("Model '{}' not found", name)))?;

        if let Some(local_path) = &model.local_path {
            if local_path.exists() && Self::validate_model_files(local_path)? {
                log::info!("Model '{}' already cached at {:?}", name, local_path);
                return Ok(local_path.clone());
            }
        }

        let model_dir = self.cache_dir.join(&model.name);
        std::fs::create_dir_all(&model_dir)?;

        log::info!(
            "Downloading model '{}' from HuggingFace Hub: {}",
            name,
            model.hub_id
        );

        let files_to_download = [
            "config.json",
            "tokenizer.json",
            "tokenizer_config.json",
            "model.safetensors",
            "vocab.txt",
        ];

        let mut downloaded_any = false;
        for file_name in files_to_download {
            match Self::download_file(&model.hub_id, file_name, &model_dir) {
                Ok(_) => {
                    downloaded_any = true;
                    log::debug!("Downloaded {}/{}", model.hub_id, file_name);
                }
                Err(e) => {
                    // Some files are optional, only warn
                    log::warn!("Failed to download {}/{}: {}", model.hub_id, file_name, e);
                }
            }
        }

        if downloaded_any {
            log::info!("Successfully downloaded model files for '{}'", name);
            model.local_path = Some(model_dir.clone());
            model.cached = true;
        } else {
            log::error!("Failed to download any files for model '{}'", name);
            return Err(AskpageError::MachineLearning(format!(
                "Failed to download model '{}'",
                name
            )));
        }

        Ok(model_dir)
    }

    /// Download a single file from HuggingFace Hub
    fn download_file(repo_id: &str, filename: &str, target_dir: &Path) -> Result<()> {
        use hf_hub::api::sync::Api;

        let api = Api::new()
            .map_err(|e| AskpageError::MachineLearning(format!("Failed to create HF API: {}", e)))?;

        let repo = api.model(repo_id.to_string());
        let target_path = target_dir.join(filename);

        // Skip if file already exists and is non-empty
        if target_path.exists() && target_path.metadata()?.len() > 0 {
            return Ok(());
        }

        match repo.get(filename) {
            Ok(downloaded_path) => {
                std::fs::copy(&downloaded_path, &target_path).map_err(|e| {
                    AskpageError::MachineLearning(format!("Failed to copy file: {}", e))
                })?;
                log::debug!("Downloaded and copied {} to {:?}", filename, target_path);
                Ok(())
            }
            Err(e) => Err(AskpageError::MachineLearning(format!(
                "Failed to download {}: {}",
                filename, e
            ))),
        }
    }

    /// Validate that essential model files exist
    fn validate_model_files(model_dir: &Path) -> Result<bool> {
        let essential_files = ["config.json", "tokenizer.json", "model.safetensors"];

        for file_name in essential_files {
            let file_path = model_dir.join(file_name);
            if !file_path.exists() || file_path.metadata()?.len() == 0 {
                return Ok(false);
            }
        }

        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_model_manager_creation() {
        let temp_dir = TempDir::new().unwrap();
        let manager = ModelManager::new(Some(temp_dir.path().to_path_buf())).unwrap();

        assert!(manager.cache_dir().exists());
        assert!(manager.get_model("all-MiniLM-L6-v2").is_some());
        assert!(
            manager
                .get_model("distilbert-base-cased-distilled-squad")
                .is_some()
        );
    }

    #[test]
    fn test_model_listing() {
        let temp_dir = TempDir::new().unwrap();
        let manager = ModelManager::new(Some(temp_dir.path().to_path_buf())).unwrap();

        let models = manager.list_models();
        assert!(models.len() >= 2);

        let model_names: Vec<&str> = models.iter().map(|m| m.name.as_str()).collect();
        assert!(model_names.contains(&"all-MiniLM-L6-v2"));
        assert!(model_names.contains(&"distilbert-base-cased-distilled-squad"));
    }

    #[test]
    fn test_model_not_cached_initially() {
        let temp_dir = TempDir::new().unwrap();
        let manager = ModelManager::new(Some(temp_dir.path().to_path_buf())).unwrap();

        assert!(!manager.is_cached("all-MiniLM-L6-v2"));
        assert!(!manager.is_cached("nonexistent-model"));
    }
}
