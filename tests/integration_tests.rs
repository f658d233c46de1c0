//! End-to-end pipeline tests
//!
//! Exercises the chunk -> embed -> store -> retrieve -> answer pipeline with
//! the offline model fallbacks so everything runs without network access.

use askpage::page::extract_paragraphs;
use askpage::{Chunk, Config, PageIndexer, QaSession};
use std::io::Cursor;
use tempfile::TempDir;

const PAGE_HTML: &str = r#"
<html>
  <body>
    <h1>Singapore</h1>
    <p>Singapore is a sovereign island city-state in maritime Southeast Asia.</p>
    <div class="infobox"><p>The population of Singapore is about 5.9 million people.</p></div>
    <p>Singapore gained independence from Malaysia on 9 August 1965.</p>
    <p></p>
    <p>Changi Airport serves over 60 million passengers a year.</p>
  </body>
</html>
"#;

fn test_config(dir: &TempDir) -> Config {
    let mut config = Config::default();
    config.storage.data_dir = dir.path().to_path_buf();
    config
}

fn page_chunks() -> Vec<Chunk> {
    Chunk::from_paragraphs(extract_paragraphs(PAGE_HTML).unwrap())
}

#[test]
fn paragraphs_become_chunks_in_document_order() {
    let chunks = page_chunks();

    assert_eq!(chunks.len(), 5);
    assert_eq!(chunks[0].id, "id0");
    assert!(chunks[0].text.contains("sovereign island city-state"));
    assert!(chunks[1].text.contains("5.9 million"));
    // Empty paragraphs are kept so ids track the page's paragraph sequence
    assert_eq!(chunks[3].text, "");
    assert!(chunks[4].text.contains("Changi Airport"));
}

#[test]
fn collection_is_created_exactly_once_across_runs() {
    let dir = TempDir::new().unwrap();

    for _ in 0..3 {
        let mut indexer = PageIndexer::offline(test_config(&dir)).unwrap();
        indexer.index_chunks(page_chunks()).unwrap();
    }

    let indexer = PageIndexer::offline(test_config(&dir)).unwrap();
    assert_eq!(
        indexer.store().list_collections().unwrap(),
        vec!["default".to_string()]
    );
}

#[test]
fn rerunning_never_duplicates_entries() {
    let dir = TempDir::new().unwrap();

    let mut indexer = PageIndexer::offline(test_config(&dir)).unwrap();
    let first = indexer.index_chunks(page_chunks()).unwrap();
    assert_eq!(first.newly_indexed, 5);

    // Same process
    let second = indexer.index_chunks(page_chunks()).unwrap();
    assert_eq!(second.newly_indexed, 0);

    // Fresh process on the same data directory
    let mut indexer = PageIndexer::offline(test_config(&dir)).unwrap();
    let third = indexer.index_chunks(page_chunks()).unwrap();
    assert_eq!(third.newly_indexed, 0);
    assert_eq!(indexer.store().count("default").unwrap(), 5);
}

#[test]
fn quit_terminates_without_retrieval() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir);

    // Nothing indexed: any retrieval attempt would fail loudly
    let mut session = QaSession::offline(&config).unwrap();
    let mut output = Vec::new();

    session
        .run_interactive(Cursor::new("quit\n"), &mut output)
        .unwrap();

    assert_eq!(
        String::from_utf8(output).unwrap(),
        "Please enter your question: "
    );
}

#[test]
fn each_question_prints_one_text_and_one_answer_line() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir);

    let mut indexer = PageIndexer::offline(config.clone()).unwrap();
    indexer.index_chunks(page_chunks()).unwrap();

    let mut session = QaSession::offline(&config).unwrap();
    let mut output = Vec::new();

    session
        .run_interactive(
            Cursor::new("What is the population?\nWhen was independence?\nquit\n"),
            &mut output,
        )
        .unwrap();

    let printed = String::from_utf8(output).unwrap();
    assert_eq!(printed.matches("Text: ").count(), 2);
    assert_eq!(printed.matches("Answer: ").count(), 2);

    // Each cycle prints the chunk before the answer
    for block in printed.split("Please enter your question: ").skip(1) {
        if block.is_empty() {
            continue;
        }
        let text_pos = block.find("Text: ").unwrap();
        let answer_pos = block.find("Answer: ").unwrap();
        assert!(text_pos < answer_pos);
    }
}

#[test]
fn retrieval_returns_exactly_one_document() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir);

    let mut indexer = PageIndexer::offline(config.clone()).unwrap();
    indexer.index_chunks(page_chunks()).unwrap();

    let mut session = QaSession::offline(&config).unwrap();
    let exchange = session.ask("How many passengers does the airport serve?").unwrap();

    // top-1 retrieval: one chunk id, one context, answer drawn from it
    let all_ids: Vec<String> = (0..5).map(|i| format!("id{}", i)).collect();
    assert!(all_ids.contains(&exchange.chunk_id));
    assert!(exchange.context.contains(&exchange.answer));
}

#[test]
fn answers_are_substrings_of_the_retrieved_chunk() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir);

    let mut indexer = PageIndexer::offline(config.clone()).unwrap();
    indexer.index_chunks(page_chunks()).unwrap();

    let mut session = QaSession::offline(&config).unwrap();

    for question in [
        "What is the population of Singapore?",
        "When did Singapore gain independence?",
        "How busy is Changi Airport?",
    ] {
        let exchange = session.ask(question).unwrap();
        assert!(
            exchange.context.contains(&exchange.answer),
            "answer {:?} not found in context {:?}",
            exchange.answer,
            exchange.context
        );
    }
}
