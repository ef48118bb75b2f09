//! Scoring functions for hybrid retrieval
//!
//! Vector scores are cosine similarity shifted into [0, 1] with
//! `(cos + 1) / 2`. The mapping is monotonic, so thresholds keep their
//! ordering, and its version string is persisted with the index.

use crate::error::{Result, VaultdexError};
use regex::Regex;

/// Persisted identifier of the vector score normalization
pub const SCORE_NORMALIZATION: &str = "cosine-shifted-v1";

/// Cosine similarity, `None` for empty, zero-norm or mismatched vectors
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Option<f32> {
    if a.is_empty() || a.len() != b.len() {
        return None;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let mag_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let mag_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if mag_a == 0.0 || mag_b == 0.0 {
        return None;
    }
    Some(dot / (mag_a * mag_b))
}

/// Map a cosine in [-1, 1] to [0, 1]
pub fn normalize_cosine(cos: f32) -> f32 {
    ((cos + 1.0) / 2.0).clamp(0.0, 1.0)
}

/// Normalized vector score; chunks without a usable embedding score 0
pub fn vector_score(query: &[f32], embedding: &[f32]) -> f32 {
    cosine_similarity(query, embedding)
        .map(normalize_cosine)
        .unwrap_or(0.0)
}

/// `(1 - text_weight) * vector + text_weight * lexical`
pub fn blend(vector: f32, lexical: f32, text_weight: f32) -> f32 {
    (1.0 - text_weight) * vector + text_weight * lexical
}

/// Case-insensitive whole-word matcher for salient terms
#[derive(Debug, Clone)]
pub struct LexicalMatcher {
    patterns: Vec<Regex>,
}

impl LexicalMatcher {
    /// Build a matcher; blank and repeated terms are ignored
    pub fn new(terms: &[String]) -> Result<Self> {
        let mut seen: Vec<String> = Vec::new();
        let mut patterns = Vec::new();

        for term in terms {
            let term = term.trim().to_lowercase();
            if term.is_empty() || seen.contains(&term) {
                continue;
            }
            let pattern = format!(r"(?i)(?:^|\W){}(?:\W|$)", regex::escape(&term));
            let regex = Regex::new(&pattern).map_err(|e| {
                VaultdexError::Configuration(format!("Invalid salient term {:?}: {}", term, e))
            })?;
            patterns.push(regex);
            seen.push(term);
        }

        Ok(Self { patterns })
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Fraction of terms found in `content`; 0 when there are no terms
    pub fn score(&self, content: &str) -> f32 {
        if self.patterns.is_empty() {
            return 0.0;
        }
        let hits = self.patterns.iter().filter(|p| p.is_match(content)).count();
        hits as f32 / self.patterns.len() as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn terms(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_cosine_similarity() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]), Some(1.0));
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), Some(0.0));
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]), Some(-1.0));
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[]), None);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), None);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), None);
    }

    #[test]
    fn test_normalization_range_and_order() {
        assert_eq!(normalize_cosine(-1.0), 0.0);
        assert_eq!(normalize_cosine(0.0), 0.5);
        assert_eq!(normalize_cosine(1.0), 1.0);
        assert!(normalize_cosine(0.2) < normalize_cosine(0.3));
        assert_eq!(vector_score(&[1.0, 0.0], &[]), 0.0);
    }

    #[test]
    fn test_blend() {
        assert_eq!(blend(0.8, 1.0, 0.0), 0.8);
        assert_eq!(blend(0.8, 1.0, 1.0), 1.0);
        assert!((blend(0.6, 1.0, 0.5) - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_whole_word_case_insensitive() {
        let matcher = LexicalMatcher::new(&terms(&["red"])).unwrap();
        assert_eq!(matcher.score("Apples are RED."), 1.0);
        assert_eq!(matcher.score("red"), 1.0);
        assert_eq!(matcher.score("bored tigers"), 0.0);
        assert_eq!(matcher.score("reddish"), 0.0);
    }

    #[test]
    fn test_fraction_of_terms() {
        let matcher = LexicalMatcher::new(&terms(&["apples", "red", "yellow", "  "])).unwrap();
        assert!((matcher.score("apples are red") - 2.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_duplicate_terms_count_once() {
        let matcher = LexicalMatcher::new(&terms(&["Red", "red"])).unwrap();
        assert_eq!(matcher.score("red"), 1.0);
    }

    #[test]
    fn test_empty_terms_score_zero() {
        let matcher = LexicalMatcher::new(&[]).unwrap();
        assert!(matcher.is_empty());
        assert_eq!(matcher.score("anything"), 0.0);
    }

    #[test]
    fn test_symbol_terms() {
        let matcher = LexicalMatcher::new(&terms(&["c++"])).unwrap();
        assert_eq!(matcher.score("I write c++ daily"), 1.0);
        assert_eq!(matcher.score("I write c daily"), 0.0);
    }
}
