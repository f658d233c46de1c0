//! Paragraph extraction and chunk construction

use crate::error::{AskpageError, Result};
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};

/// A paragraph-level chunk of page text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Synthetic identifier, unique within a collection
    pub id: String,
    /// Paragraph text
    pub text: String,
}

impl Chunk {
    /// Build chunks from an ordered list of paragraphs
    ///
    /// Identifiers follow the `id{index}` scheme in document order.
    pub fn from_paragraphs(paragraphs: Vec<String>) -> Vec<Chunk> {
        paragraphs
            .into_iter()
            .enumerate()
            .map(|(i, text)| Chunk {
                id: format!("id{}", i),
                text,
            })
            .collect()
    }
}

/// Extract the text of every `<p>` element in document order
///
/// Empty paragraphs are retained so that chunk indices line up with the
/// page's paragraph sequence.
pub fn extract_paragraphs(html: &str) -> Result<Vec<String>> {
    let document = Html::parse_document(html);
    let selector = Selector::parse("p")
        .map_err(|e| AskpageError::Html(format!("Invalid paragraph selector: {}", e)))?;

    let paragraphs: Vec<String> = document
        .select(&selector)
        .map(|element| element.text().collect::<String>())
        .collect();

    log::info!("Extracted {} paragraphs", paragraphs.len());
    Ok(paragraphs)
}
