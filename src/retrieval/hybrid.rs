//! Hybrid retriever over the document store

use super::scoring::{blend, vector_score, LexicalMatcher};
use super::{rank_order, RelatedNote, RetrievalConfig, ScoredChunk};
use crate::embedding::{EmbeddingError, EmbeddingProvider};
use crate::error::{Result, VaultdexError};
use crate::storage::{DocumentChunk, DocumentStore};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// Scores every stored chunk against a query
///
/// Reads a consistent snapshot of chunk sets, so a concurrent upsert of a
/// path is seen either entirely or not at all.
pub struct HybridRetriever {
    store: Arc<DocumentStore>,
    provider: Arc<dyn EmbeddingProvider>,
}

impl HybridRetriever {
    pub fn new(store: Arc<DocumentStore>, provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self { store, provider }
    }

    fn embed_query(&self, query: &str) -> Result<Vec<f32>> {
        let vector = self.provider.embed(query)?;
        if vector.len() != self.store.dimension() {
            return Err(VaultdexError::Configuration(
                EmbeddingError::DimensionMismatch {
                    expected: self.store.dimension(),
                    actual: vector.len(),
                }
                .to_string(),
            ));
        }
        Ok(vector)
    }

    /// Rank stored chunks by blended vector and salient-term score
    ///
    /// A blank query returns no results without calling the provider.
    pub fn retrieve(
        &self,
        query: &str,
        salient_terms: &[String],
        config: &RetrievalConfig,
    ) -> Result<Vec<ScoredChunk>> {
        config.validate()?;
        if query.trim().is_empty() {
            return Ok(Vec::new());
        }

        let matcher = LexicalMatcher::new(salient_terms)?;
        let query_vector = self.embed_query(query)?;
        let chunk_sets = self.store.chunk_sets()?;

        let mut results: Vec<ScoredChunk> = chunk_sets
            .iter()
            .flat_map(|set| set.iter())
            .filter_map(|chunk| {
                let vector = vector_score(&query_vector, &chunk.embedding);
                let lexical = matcher.score(&chunk.content);
                let score = blend(vector, lexical, config.text_weight);
                (score >= config.min_similarity_score).then(|| ScoredChunk {
                    chunk: chunk.clone(),
                    score,
                    vector_score: vector,
                    lexical_score: lexical,
                })
            })
            .collect();

        results.sort_by(rank_order);
        results.truncate(config.max_k);

        debug!(
            "Retrieved {} chunks for query ({} salient terms)",
            results.len(),
            salient_terms.len()
        );
        Ok(results)
    }

    /// Files most similar to `path`, scored by their best chunk
    ///
    /// The source file is represented by the mean of its chunk embeddings.
    /// Only vector similarity counts; `text_weight` is ignored. A path with
    /// no embedded chunks has no related notes.
    pub fn find_relevant_notes(
        &self,
        path: &str,
        config: &RetrievalConfig,
    ) -> Result<Vec<RelatedNote>> {
        config.validate()?;

        let source = self.store.get(path)?;
        let Some(query_vector) = mean_embedding(&source) else {
            debug!("No embeddings stored for {}", path);
            return Ok(Vec::new());
        };

        let chunk_sets = self.store.chunk_sets()?;
        let mut best: BTreeMap<&str, (f32, &DocumentChunk)> = BTreeMap::new();
        for chunk in chunk_sets.iter().flat_map(|set| set.iter()) {
            if chunk.path == path || !chunk.has_embedding() {
                continue;
            }
            let score = vector_score(&query_vector, &chunk.embedding);
            if score < config.min_similarity_score {
                continue;
            }
            let entry = best.entry(chunk.path.as_str()).or_insert((score, chunk));
            if score > entry.0 {
                *entry = (score, chunk);
            }
        }

        let mut notes: Vec<RelatedNote> = best
            .into_iter()
            .map(|(path, (score, chunk))| RelatedNote {
                path: path.to_string(),
                score,
                best_chunk: chunk.clone(),
            })
            .collect();

        notes.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.path.cmp(&b.path)));
        notes.truncate(config.max_k);
        Ok(notes)
    }
}

fn mean_embedding(chunks: &[DocumentChunk]) -> Option<Vec<f32>> {
    let embedded: Vec<&[f32]> = chunks
        .iter()
        .filter(|c| c.has_embedding())
        .map(|c| c.embedding.as_slice())
        .collect();
    let first = embedded.first()?;

    let mut mean = vec![0.0f32; first.len()];
    for embedding in &embedded {
        for (acc, value) in mean.iter_mut().zip(embedding.iter()) {
            *acc += value;
        }
    }
    let count = embedded.len() as f32;
    mean.iter_mut().for_each(|v| *v /= count);
    Some(mean)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{hash_content, IndexMeta, Metadata};
    use tempfile::TempDir;

    const VOCAB: [&str; 4] = ["apples", "red", "bananas", "yellow"];

    /// Embeds text as counts of a small vocabulary
    struct BagOfWords;

    impl EmbeddingProvider for BagOfWords {
        fn embed(&self, text: &str) -> std::result::Result<Vec<f32>, EmbeddingError> {
            let lower = text.to_lowercase();
            Ok(VOCAB
                .iter()
                .map(|word| {
                    lower
                        .split(|c: char| !c.is_alphanumeric())
                        .filter(|w| w == word)
                        .count() as f32
                })
                .collect())
        }

        fn dimension(&self) -> usize {
            VOCAB.len()
        }

        fn model_name(&self) -> &str {
            "bag-of-words"
        }
    }

    fn setup(temp: &TempDir, docs: &[(&str, &str)]) -> HybridRetriever {
        let meta = IndexMeta {
            embedding_dimension: VOCAB.len(),
            embedding_model: "bag-of-words".to_string(),
            score_normalization: crate::retrieval::SCORE_NORMALIZATION.to_string(),
        };
        let store = Arc::new(DocumentStore::open(&temp.path().join("index.sqlite"), meta).unwrap());
        let provider = Arc::new(BagOfWords);

        for (path, text) in docs {
            let embedding = provider.embed(text).unwrap();
            let chunk =
                DocumentChunk::new(*path, 0, *text, hash_content(text), 1, Metadata::new())
                    .with_embedding(embedding);
            store.upsert(path, vec![chunk]).unwrap();
        }

        HybridRetriever::new(store, provider)
    }

    fn config(min: f32, max_k: usize, text_weight: f32) -> RetrievalConfig {
        RetrievalConfig {
            min_similarity_score: min,
            max_k,
            text_weight,
        }
    }

    fn terms(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_salient_term_boosts_matching_chunk() {
        let temp = TempDir::new().unwrap();
        let retriever = setup(
            &temp,
            &[("A.md", "apples are red"), ("B.md", "bananas are yellow")],
        );

        let results = retriever
            .retrieve("red fruit", &terms(&["red"]), &config(0.3, 20, 0.5))
            .unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].chunk.path, "A.md");
        assert_eq!(results[0].lexical_score, 1.0);
        assert!(results[0].score > 0.9);
    }

    #[test]
    fn test_threshold_filters_everything_below() {
        let temp = TempDir::new().unwrap();
        let retriever = setup(
            &temp,
            &[("A.md", "apples are red"), ("B.md", "bananas are yellow")],
        );

        let results = retriever
            .retrieve("bananas yellow", &[], &config(0.9, 20, 0.0))
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].chunk.path, "B.md");
        assert!(results.iter().all(|r| r.score >= 0.9));

        let none = retriever
            .retrieve("bananas yellow", &[], &config(1.0, 20, 0.5))
            .unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn test_results_are_sorted_and_truncated() {
        let temp = TempDir::new().unwrap();
        let retriever = setup(
            &temp,
            &[
                ("A.md", "apples red"),
                ("B.md", "apples apples red"),
                ("C.md", "bananas"),
                ("D.md", "apples red"),
            ],
        );

        let results = retriever
            .retrieve("apples red", &[], &config(0.0, 3, 0.0))
            .unwrap();
        assert_eq!(results.len(), 3);
        assert!(results.windows(2).all(|w| w[0].score >= w[1].score));
        // equal scores fall back to path order
        assert_eq!(results[0].chunk.path, "A.md");
        assert_eq!(results[1].chunk.path, "D.md");
    }

    #[test]
    fn test_retrieval_is_deterministic() {
        let temp = TempDir::new().unwrap();
        let retriever = setup(
            &temp,
            &[
                ("A.md", "apples are red"),
                ("B.md", "red bananas"),
                ("C.md", "yellow apples"),
            ],
        );

        let cfg = config(0.0, 20, 0.4);
        let first = retriever.retrieve("red apples", &terms(&["red"]), &cfg).unwrap();
        let second = retriever.retrieve("red apples", &terms(&["red"]), &cfg).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_raising_threshold_only_removes_results() {
        let temp = TempDir::new().unwrap();
        let retriever = setup(
            &temp,
            &[
                ("A.md", "apples are red"),
                ("B.md", "red bananas"),
                ("C.md", "yellow apples"),
            ],
        );

        let low = retriever
            .retrieve("red", &terms(&["red"]), &config(0.2, 20, 0.3))
            .unwrap();
        let high = retriever
            .retrieve("red", &terms(&["red"]), &config(0.7, 20, 0.3))
            .unwrap();

        assert!(high.len() <= low.len());
        for result in &high {
            assert!(low.iter().any(|r| r.chunk.id == result.chunk.id));
        }
    }

    #[test]
    fn test_empty_terms_dilute_vector_score() {
        let temp = TempDir::new().unwrap();
        let retriever = setup(&temp, &[("A.md", "apples")]);

        let results = retriever
            .retrieve("apples", &[], &config(0.0, 20, 0.5))
            .unwrap();
        assert!((results[0].vector_score - 1.0).abs() < 1e-6);
        assert_eq!(results[0].lexical_score, 0.0);
        assert!((results[0].score - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_blank_query_returns_nothing() {
        let temp = TempDir::new().unwrap();
        let retriever = setup(&temp, &[("A.md", "apples")]);
        let results = retriever
            .retrieve("   ", &terms(&["apples"]), &RetrievalConfig::default())
            .unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let temp = TempDir::new().unwrap();
        let retriever = setup(&temp, &[("A.md", "apples")]);
        let result = retriever.retrieve("apples", &[], &config(0.3, 0, 0.4));
        assert!(matches!(result, Err(VaultdexError::Configuration(_))));
    }

    #[test]
    fn test_chunks_without_embeddings_still_match_terms() {
        let temp = TempDir::new().unwrap();
        let retriever = setup(&temp, &[]);
        let chunk = DocumentChunk::new("N.md", 0, "red notes", "h", 1, Metadata::new());
        retriever.store.upsert("N.md", vec![chunk]).unwrap();

        let results = retriever
            .retrieve("red", &terms(&["red"]), &config(0.3, 20, 0.5))
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].vector_score, 0.0);
        assert!((results[0].score - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_find_relevant_notes_excludes_source() {
        let temp = TempDir::new().unwrap();
        let retriever = setup(
            &temp,
            &[
                ("A.md", "apples are red"),
                ("B.md", "red apples"),
                ("C.md", "bananas are yellow"),
            ],
        );

        let notes = retriever
            .find_relevant_notes("A.md", &config(0.6, 20, 0.9))
            .unwrap();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].path, "B.md");
        assert!((notes[0].score - 1.0).abs() < 1e-6);

        assert!(retriever
            .find_relevant_notes("missing.md", &RetrievalConfig::default())
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_mean_embedding() {
        let chunks = vec![
            DocumentChunk::new("A.md", 0, "a", "h", 1, Metadata::new())
                .with_embedding(vec![1.0, 0.0]),
            DocumentChunk::new("A.md", 2, "b", "h", 1, Metadata::new())
                .with_embedding(vec![0.0, 1.0]),
            DocumentChunk::new("A.md", 4, "c", "h", 1, Metadata::new()),
        ];
        assert_eq!(mean_embedding(&chunks), Some(vec![0.5, 0.5]));
        assert_eq!(mean_embedding(&chunks[2..]), None);
    }
}
