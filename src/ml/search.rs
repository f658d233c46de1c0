//! Vector similarity search
//!
//! Exact cosine-distance search over stored embeddings. The corpus here is a
//! single page's paragraphs, so a flat scan with top-k selection is the
//! appropriate strategy.

use crate::ml::embedding::Embedding;

/// A match from similarity search, referencing the scanned slice by index
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredMatch {
    /// Index into the scanned vector slice
    pub index: usize,
    /// Cosine distance (lower = more similar)
    pub distance: f32,
}

/// Cosine distance between two vectors: `1 - cos(a, b)`
///
/// Zero vectors are treated as maximally distant.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    let dot = a.iter().zip(b).map(|(x, y)| x * y).sum::<f32>();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        1.0
    } else {
        1.0 - (dot / (norm_a * norm_b))
    }
}

/// Exact top-k search over a slice of embeddings
///
/// Returns at most `top_k` matches ordered by ascending distance.
pub fn search_exact(query: &[f32], vectors: &[Embedding], top_k: usize) -> Vec<ScoredMatch> {
    let mut matches: Vec<ScoredMatch> = vectors
        .iter()
        .enumerate()
        .map(|(index, vector)| ScoredMatch {
            index,
            distance: cosine_distance(query, vector),
        })
        .collect();

    matches.sort_by(|a, b| {
        a.distance
            .partial_cmp(&b.distance)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    matches.truncate(top_k);
    matches
}
