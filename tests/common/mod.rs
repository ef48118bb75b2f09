//! Shared fixtures for integration tests
#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;
use vaultdex::chunking::TextChunker;
use vaultdex::corpus::{Corpus, FsCorpus};
use vaultdex::embedding::{EmbeddingError, EmbeddingProvider};
use vaultdex::VectorStoreManager;

pub const VOCAB: [&str; 6] = ["apples", "red", "bananas", "yellow", "green", "notes"];

/// Deterministic provider: one dimension per vocabulary word, valued by count
///
/// Can be switched into a failing mode to simulate a rate-limited provider.
#[derive(Default)]
pub struct KeywordBagProvider {
    pub calls: AtomicUsize,
    pub failing: AtomicBool,
}

impl KeywordBagProvider {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

pub fn bag_of_words(text: &str) -> Vec<f32> {
    let lower = text.to_lowercase();
    VOCAB
        .iter()
        .map(|word| {
            lower
                .split(|c: char| !c.is_alphanumeric())
                .filter(|w| w == word)
                .count() as f32
        })
        .collect()
}

impl EmbeddingProvider for KeywordBagProvider {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(EmbeddingError::RateLimited("try again later".to_string()));
        }
        Ok(bag_of_words(text))
    }

    fn dimension(&self) -> usize {
        VOCAB.len()
    }

    fn model_name(&self) -> &str {
        "keyword-bag"
    }
}

/// A notes folder plus a separate data directory
pub struct Vault {
    pub notes: TempDir,
    pub data: TempDir,
}

impl Vault {
    pub fn new() -> Self {
        Self {
            notes: TempDir::new().unwrap(),
            data: TempDir::new().unwrap(),
        }
    }

    pub fn root(&self) -> &Path {
        self.notes.path()
    }

    pub fn db_path(&self) -> PathBuf {
        self.data.path().join("index.sqlite")
    }

    pub fn write(&self, rel: &str, content: &str) {
        let path = self.notes.path().join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, content).unwrap();
    }

    pub fn delete(&self, rel: &str) {
        std::fs::remove_file(self.notes.path().join(rel)).unwrap();
    }

    pub fn corpus(&self) -> FsCorpus {
        FsCorpus::new(
            self.root().to_path_buf(),
            vec!["md".to_string()],
            vec![".obsidian".to_string()],
        )
    }

    pub fn manager(&self, provider: Arc<dyn EmbeddingProvider>) -> VectorStoreManager {
        self.manager_with_corpus(provider, Arc::new(self.corpus()))
    }

    pub fn manager_with_corpus(
        &self,
        provider: Arc<dyn EmbeddingProvider>,
        corpus: Arc<dyn Corpus>,
    ) -> VectorStoreManager {
        VectorStoreManager::new(
            self.db_path(),
            4,
            provider,
            corpus,
            Arc::new(TextChunker::default()),
        )
    }
}
