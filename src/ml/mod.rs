//! Machine learning components
//!
//! Embedding generation, extractive question answering, vector similarity
//! search, and the model plumbing they share. All inference runs through the
//! Candle framework with models pulled from HuggingFace Hub.

pub mod device;
pub mod embedding;
pub mod models;
pub mod qa;
pub mod search;

pub use device::{DeviceType, select_device};
pub use embedding::{Embedding, EmbeddingConfig, EmbeddingModel};
pub use models::ModelManager;
pub use qa::{ExtractiveQa, QaAnswer, QaConfig};
pub use search::{ScoredMatch, cosine_distance, search_exact};
