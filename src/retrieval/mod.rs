//! Hybrid retrieval
//!
//! Every stored chunk is scored in one pass with a weighted blend of
//! vector similarity and salient-term overlap, then filtered by a minimum
//! score, ranked, and truncated.

mod hybrid;
pub mod scoring;

pub use hybrid::HybridRetriever;
pub use scoring::{LexicalMatcher, SCORE_NORMALIZATION};

use crate::error::{Result, VaultdexError};
use crate::storage::DocumentChunk;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Retrieval parameters; validated on every call, never clamped
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Blended scores below this are dropped, in [0, 1]
    pub min_similarity_score: f32,
    /// Maximum number of results, > 0
    pub max_k: usize,
    /// Weight of the lexical score, in [0, 1]; vector weight is `1 - text_weight`
    pub text_weight: f32,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            min_similarity_score: 0.3,
            max_k: 20,
            text_weight: 0.4,
        }
    }
}

impl RetrievalConfig {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.min_similarity_score) {
            return Err(VaultdexError::Configuration(format!(
                "min_similarity_score must be within [0, 1], got {}",
                self.min_similarity_score
            )));
        }
        if !(0.0..=1.0).contains(&self.text_weight) {
            return Err(VaultdexError::Configuration(format!(
                "text_weight must be within [0, 1], got {}",
                self.text_weight
            )));
        }
        if self.max_k == 0 {
            return Err(VaultdexError::Configuration(
                "max_k must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// A chunk with the scores that ranked it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredChunk {
    pub chunk: DocumentChunk,
    /// Blended score used for filtering and ranking
    pub score: f32,
    pub vector_score: f32,
    pub lexical_score: f32,
}

impl ScoredChunk {
    pub fn into_chunk(self) -> DocumentChunk {
        self.chunk
    }

    /// Get a short preview of the text (first N characters)
    pub fn preview(&self, max_chars: usize) -> String {
        self.chunk.preview(max_chars)
    }
}

/// Total result order: blended score desc, vector score desc, path asc,
/// then offset and id so chunks of one file are ordered too
pub fn rank_order(a: &ScoredChunk, b: &ScoredChunk) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| b.vector_score.total_cmp(&a.vector_score))
        .then_with(|| a.chunk.path.cmp(&b.chunk.path))
        .then_with(|| a.chunk.offset.cmp(&b.chunk.offset))
        .then_with(|| a.chunk.id.cmp(&b.chunk.id))
}

/// A file similar to a source file, represented by its best chunk
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RelatedNote {
    pub path: String,
    pub score: f32,
    pub best_chunk: DocumentChunk,
}
