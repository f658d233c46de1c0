//! Extractive question answering using the Candle framework
//!
//! Runs a DistilBERT model fine-tuned on SQuAD over a (question, context)
//! pair and selects the best answer span from the context. When model weights
//! are unavailable the module degrades to a deterministic lexical-overlap
//! heuristic that still returns a literal substring of the context.

use crate::error::{AskpageError, Result};
use crate::ml::device::{DeviceType, select_device};
use crate::ml::models::ModelManager;

use candle_core::{DType, Device, Tensor};
use candle_nn::{Linear, Module, VarBuilder};
use candle_transformers::models::distilbert::{Config as DistilBertConfig, DistilBertModel};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tokenizers::{Tokenizer, TruncationDirection, TruncationParams, TruncationStrategy};

/// Configuration for the extractive QA model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QaConfig {
    /// Model name or path
    pub model_name: String,
    /// Maximum combined sequence length for (question, context)
    pub max_seq_len: usize,
    /// Maximum answer span length in tokens
    pub max_answer_len: usize,
    /// Device to use for inference
    pub device_type: DeviceType,
}

impl Default for QaConfig {
    fn default() -> Self {
        Self {
            model_name: "distilbert-base-cased-distilled-squad".to_string(),
            max_seq_len: 384,
            max_answer_len: 30,
            device_type: select_device(),
        }
    }
}

/// An extracted answer span with its confidence score
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QaAnswer {
    /// Answer text, a literal substring of the context
    pub text: String,
    /// Confidence score in [0, 1]
    pub score: f32,
}

/// Hidden dimension read from the model's config.json
#[derive(Debug, Deserialize)]
struct QaHeadDims {
    dim: usize,
}

/// Loaded DistilBERT QA model with its span classification head
struct QaModel {
    model: DistilBertModel,
    qa_outputs: Linear,
    tokenizer: Tokenizer,
    device: Device,
}

/// Extractive question answering over a single context
pub struct ExtractiveQa {
    /// Configuration
    config: QaConfig,
    /// Model manager for loading models
    model_manager: ModelManager,
    /// Loaded model, when weights are available
    model: Option<QaModel>,
    /// Sentence splitter for the fallback path
    sentence_regex: Regex,
}

impl ExtractiveQa {
    /// Create new QA model, loading weights from HuggingFace Hub
    ///
    /// The model is loaded once and reused for every question.
    pub async fn new(config: QaConfig) -> Result<Self> {
        log::info!("Initializing QA model: {}", config.model_name);

        let mut qa = Self::offline(config)?;

        if let Err(e) = qa.load_model().await {
            log::warn!("Failed to load QA model, will use fallback: {}", e);
        }

        Ok(qa)
    }

    /// Create a QA model that never loads weights
    ///
    /// Always answers through the lexical-overlap heuristic. Useful for
    /// offline operation and tests.
    pub fn offline(config: QaConfig) -> Result<Self> {
        let model_manager = ModelManager::new(None)?;
        let sentence_regex = Regex::new(r"[^.!?]+[.!?]*").map_err(|e| {
            AskpageError::MachineLearning(format!("Failed to compile sentence pattern: {}", e))
        })?;

        Ok(Self {
            config,
            model_manager,
            model: None,
            sentence_regex,
        })
    }

    /// Load DistilBERT weights, QA head, and tokenizer
    async fn load_model(&mut self) -> Result<()> {
        let model_dir = self
            .model_manager
            .download_model(&self.config.model_name)
            .await?;

        let tokenizer_path = model_dir.join("tokenizer.json");
        let mut tokenizer = Tokenizer::from_file(&tokenizer_path).map_err(|e| {
            AskpageError::MachineLearning(format!("Failed to load tokenizer: {}", e))
        })?;

        // Truncate the context, never the question, when the pair is too long
        tokenizer
            .with_truncation(Some(TruncationParams {
                direction: TruncationDirection::Right,
                max_length: self.config.max_seq_len,
                strategy: TruncationStrategy::OnlySecond,
                stride: 0,
            }))
            .map_err(|e| {
                AskpageError::MachineLearning(format!("Failed to configure truncation: {}", e))
            })?;

        let device = self.config.device_type.to_device()?;
        let config_json = std::fs::read_to_string(model_dir.join("config.json"))?;
        let bert_config: DistilBertConfig = serde_json::from_str(&config_json)?;
        let head_dims: QaHeadDims = serde_json::from_str(&config_json)?;

        let weights_path = model_dir.join("model.safetensors");
        let vb =
            unsafe { VarBuilder::from_mmaped_safetensors(&[weights_path], DType::F32, &device)? };

        let model = DistilBertModel::load(vb.pp("distilbert"), &bert_config)?;
        let qa_outputs = candle_nn::linear(head_dims.dim, 2, vb.pp("qa_outputs"))?;

        self.model = Some(QaModel {
            model,
            qa_outputs,
            tokenizer,
            device,
        });
        log::info!("QA model loaded: {}", self.config.model_name);

        Ok(())
    }

    /// Whether real model inference is available
    pub fn is_ready(&self) -> bool {
        self.model.is_some()
    }

    /// Extract the answer to a question from the given context
    pub fn answer(&self, question: &str, context: &str) -> Result<QaAnswer> {
        if let Some(model) = &self.model {
            match self.answer_with_model(model, question, context) {
                Ok(answer) => return Ok(answer),
                Err(e) => {
                    log::warn!("QA inference failed, using fallback: {}", e);
                }
            }
        }

        self.answer_by_overlap(question, context)
    }

    /// DistilBERT span extraction
    fn answer_with_model(
        &self,
        qa: &QaModel,
        question: &str,
        context: &str,
    ) -> Result<QaAnswer> {
        let encoding = qa
            .tokenizer
            .encode((question, context), true)
            .map_err(|e| AskpageError::MachineLearning(format!("Tokenization failed: {}", e)))?;

        let ids = encoding.get_ids();
        let seq_len = ids.len();
        if seq_len == 0 {
            return self.answer_by_overlap(question, context);
        }

        let input_ids = Tensor::new(ids, &qa.device)?.unsqueeze(0)?;
        // DistilBERT attention masks flag positions to hide; all zeros keeps
        // every token visible to every other
        let attention_mask = Tensor::zeros((seq_len, seq_len), DType::U8, &qa.device)?;

        let hidden = qa.model.forward(&input_ids, &attention_mask)?;
        let logits = qa.qa_outputs.forward(&hidden)?;

        let start_logits: Vec<f32> = logits.narrow(2, 0, 1)?.flatten_all()?.to_vec1()?;
        let end_logits: Vec<f32> = logits.narrow(2, 1, 1)?.flatten_all()?.to_vec1()?;

        // Candidate positions are context tokens with real character offsets
        let sequence_ids = encoding.get_sequence_ids();
        let offsets = encoding.get_offsets();
        let context_positions: Vec<usize> = (0..seq_len)
            .filter(|&i| sequence_ids[i] == Some(1) && offsets[i].1 > offsets[i].0)
            .collect();

        if context_positions.is_empty() {
            return self.answer_by_overlap(question, context);
        }

        let mut best: Option<(usize, usize, f32)> = None;
        for (si, &s) in context_positions.iter().enumerate() {
            for &e in context_positions[si..].iter() {
                if e - s >= self.config.max_answer_len {
                    break;
                }
                let score = start_logits[s] + end_logits[e];
                if best.map_or(true, |(_, _, b)| score > b) {
                    best = Some((s, e, score));
                }
            }
        }

        let Some((start, end, _)) = best else {
            return self.answer_by_overlap(question, context);
        };

        let start_probs = softmax_over(&start_logits, &context_positions);
        let end_probs = softmax_over(&end_logits, &context_positions);
        let score = start_probs.get(&start).copied().unwrap_or(0.0)
            * end_probs.get(&end).copied().unwrap_or(0.0);

        let span_start = offsets[start].0;
        let span_end = offsets[end].1;
        match context.get(span_start..span_end) {
            Some(text) if !text.trim().is_empty() => Ok(QaAnswer {
                text: text.trim().to_string(),
                score,
            }),
            _ => self.answer_by_overlap(question, context),
        }
    }

    /// Lexical-overlap fallback: the context sentence sharing the most
    /// question terms wins
    fn answer_by_overlap(&self, question: &str, context: &str) -> Result<QaAnswer> {
        if context.trim().is_empty() {
            return Ok(QaAnswer {
                text: String::new(),
                score: 0.0,
            });
        }

        let terms: Vec<String> = question
            .split_whitespace()
            .map(|w| {
                w.trim_matches(|c: char| !c.is_alphanumeric())
                    .to_lowercase()
            })
            .filter(|w| w.len() > 2)
            .collect();

        let mut best_sentence = "";
        let mut best_overlap = 0usize;

        for m in self.sentence_regex.find_iter(context) {
            let sentence = m.as_str().trim();
            if sentence.is_empty() {
                continue;
            }
            if best_sentence.is_empty() {
                best_sentence = sentence;
            }

            let lowered = sentence.to_lowercase();
            let overlap = terms.iter().filter(|t| lowered.contains(t.as_str())).count();
            if overlap > best_overlap {
                best_overlap = overlap;
                best_sentence = sentence;
            }
        }

        let score = if terms.is_empty() {
            0.0
        } else {
            best_overlap as f32 / terms.len() as f32
        };

        Ok(QaAnswer {
            text: best_sentence.to_string(),
            score,
        })
    }
}

/// Softmax restricted to the given positions, keyed by position
fn softmax_over(
    logits: &[f32],
    positions: &[usize],
) -> std::collections::HashMap<usize, f32> {
    let max = positions
        .iter()
        .map(|&i| logits[i])
        .fold(f32::NEG_INFINITY, f32::max);
    let denom: f32 = positions.iter().map(|&i| (logits[i] - max).exp()).sum();

    positions
        .iter()
        .map(|&i| (i, (logits[i] - max).exp() / denom.max(1e-12)))
        .collect()
}
