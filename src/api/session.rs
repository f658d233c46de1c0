//! Question answering session
//!
//! Retrieves the single most similar chunk for a question and runs extractive
//! QA over it. Both models are loaded once per session and reused for every
//! question.

use crate::config::Config;
use crate::error::{AskpageError, Result};
use crate::ml::embedding::{EmbeddingConfig, EmbeddingModel};
use crate::ml::qa::{ExtractiveQa, QaConfig};
use crate::storage::CollectionStore;
use std::io::{BufRead, Write};

/// The literal console input that ends an interactive session
pub const QUIT_COMMAND: &str = "quit";

/// One retrieve-and-answer cycle
#[derive(Debug, Clone)]
pub struct QaExchange {
    /// Identifier of the retrieved chunk
    pub chunk_id: String,
    /// Text of the retrieved chunk
    pub context: String,
    /// Extracted answer
    pub answer: String,
    /// Answer confidence in [0, 1]
    pub score: f32,
    /// Cosine distance between question and chunk
    pub distance: f32,
}

/// Interactive question answering over an indexed collection
pub struct QaSession {
    store: CollectionStore,
    embedder: EmbeddingModel,
    qa: ExtractiveQa,
    collection: String,
    top_k: usize,
}

impl QaSession {
    /// Create a new session, loading both models
    pub async fn new(config: &Config) -> Result<Self> {
        config.validate()?;

        let store = CollectionStore::open(&config.storage.data_dir)?;
        let embedder = EmbeddingModel::new(EmbeddingConfig {
            model_name: config.model.embedding_model.clone(),
            ..Default::default()
        })
        .await?;
        let qa = ExtractiveQa::new(QaConfig {
            model_name: config.model.qa_model.clone(),
            ..Default::default()
        })
        .await?;

        Ok(Self {
            store,
            embedder,
            qa,
            collection: config.storage.collection.clone(),
            top_k: config.model.top_k,
        })
    }

    /// Create a session that uses the offline fallbacks for both models
    pub fn offline(config: &Config) -> Result<Self> {
        config.validate()?;

        let store = CollectionStore::open(&config.storage.data_dir)?;
        let embedder = EmbeddingModel::offline(EmbeddingConfig {
            model_name: config.model.embedding_model.clone(),
            ..Default::default()
        })?;
        let qa = ExtractiveQa::offline(QaConfig {
            model_name: config.model.qa_model.clone(),
            ..Default::default()
        })?;

        Ok(Self {
            store,
            embedder,
            qa,
            collection: config.storage.collection.clone(),
            top_k: config.model.top_k,
        })
    }

    /// Answer a single question against the indexed collection
    pub fn ask(&mut self, question: &str) -> Result<QaExchange> {
        let embedding = self.embedder.encode(question)?;
        let matches = self.store.query(&self.collection, &embedding, self.top_k)?;

        let hit = matches.into_iter().next().ok_or_else(|| {
            AskpageError::Search(format!("Collection '{}' is empty", self.collection))
        })?;

        let answer = self.qa.answer(question, &hit.text)?;

        Ok(QaExchange {
            chunk_id: hit.id,
            context: hit.text,
            answer: answer.text,
            score: answer.score,
            distance: hit.distance,
        })
    }

    /// Run the interactive console loop
    ///
    /// Prompts for a question, prints the retrieved chunk and the answer, and
    /// repeats until the literal `quit` (or end of input). The quit command
    /// terminates before any retrieval happens.
    pub fn run_interactive<R: BufRead, W: Write>(
        &mut self,
        mut reader: R,
        mut writer: W,
    ) -> Result<()> {
        loop {
            write!(writer, "Please enter your question: ")?;
            writer.flush()?;

            let mut line = String::new();
            if reader.read_line(&mut line)? == 0 {
                break;
            }

            let question = line.trim();
            if question.is_empty() {
                continue;
            }
            if question == QUIT_COMMAND {
                break;
            }

            let exchange = self.ask(question)?;
            writeln!(writer, "Text: {}", exchange.context)?;
            writeln!(writer, "Answer: {}", exchange.answer)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::indexer::PageIndexer;
    use crate::page::Chunk;
    use std::io::Cursor;
    use tempfile::TempDir;

    fn test_config(dir: &TempDir) -> Config {
        let mut config = Config::default();
        config.storage.data_dir = dir.path().to_path_buf();
        config
    }

    fn indexed_session(dir: &TempDir) -> QaSession {
        let config = test_config(dir);
        let mut indexer = PageIndexer::offline(config.clone()).unwrap();
        indexer
            .index_chunks(Chunk::from_paragraphs(vec![
                "Singapore is a sovereign city-state in Southeast Asia.".to_string(),
                "The population of Singapore is about 5.9 million people.".to_string(),
                "Singapore gained independence from Malaysia in 1965.".to_string(),
            ]))
            .unwrap();
        QaSession::offline(&config).unwrap()
    }

    #[test]
    fn test_ask_returns_single_chunk_and_answer() {
        let dir = TempDir::new().unwrap();
        let mut session = indexed_session(&dir);

        let exchange = session.ask("What is the population of Singapore?").unwrap();

        assert!(exchange.chunk_id.starts_with("id"));
        assert!(!exchange.context.is_empty());
        assert!(exchange.context.contains(&exchange.answer));
    }

    #[test]
    fn test_ask_on_empty_collection_fails() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);

        let mut indexer = PageIndexer::offline(config.clone()).unwrap();
        indexer.index_chunks(Vec::new()).unwrap();

        let mut session = QaSession::offline(&config).unwrap();
        assert!(session.ask("anything?").is_err());
    }

    #[test]
    fn test_quit_terminates_without_retrieval() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);

        // No collection exists, so any retrieval attempt would error
        let mut session = QaSession::offline(&config).unwrap();
        let mut output = Vec::new();

        session
            .run_interactive(Cursor::new("quit\n"), &mut output)
            .unwrap();

        let printed = String::from_utf8(output).unwrap();
        assert_eq!(printed, "Please enter your question: ");
    }

    #[test]
    fn test_question_produces_text_then_answer() {
        let dir = TempDir::new().unwrap();
        let mut session = indexed_session(&dir);
        let mut output = Vec::new();

        session
            .run_interactive(
                Cursor::new("When did Singapore gain independence?\nquit\n"),
                &mut output,
            )
            .unwrap();

        let printed = String::from_utf8(output).unwrap();
        assert_eq!(printed.matches("Text: ").count(), 1);
        assert_eq!(printed.matches("Answer: ").count(), 1);

        let text_pos = printed.find("Text: ").unwrap();
        let answer_pos = printed.find("Answer: ").unwrap();
        assert!(text_pos < answer_pos);
    }

    #[test]
    fn test_blank_input_reprompts() {
        let dir = TempDir::new().unwrap();
        let mut session = indexed_session(&dir);
        let mut output = Vec::new();

        session
            .run_interactive(Cursor::new("\n   \nquit\n"), &mut output)
            .unwrap();

        let printed = String::from_utf8(output).unwrap();
        assert_eq!(printed.matches("Please enter your question: ").count(), 3);
        assert_eq!(printed.matches("Text: ").count(), 0);
    }

    #[test]
    fn test_eof_ends_session() {
        let dir = TempDir::new().unwrap();
        let mut session = indexed_session(&dir);
        let mut output = Vec::new();

        session
            .run_interactive(Cursor::new(""), &mut output)
            .unwrap();

        let printed = String::from_utf8(output).unwrap();
        assert_eq!(printed, "Please enter your question: ");
    }
}
