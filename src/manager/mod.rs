//! Vector store manager
//!
//! The one entry point the application talks to. It opens the document
//! store lazily, serialises mutating operations (a second one fails fast
//! with [`VaultdexError::Busy`]), and hands reads to the hybrid retriever
//! without waiting on writers.

use crate::chunking::{Chunker, TextChunker};
use crate::config::Config;
use crate::corpus::{Corpus, FsCorpus};
use crate::embedding::{BatchProcessor, EmbeddingProvider};
use crate::error::{Result, VaultdexError};
use crate::retrieval::{
    HybridRetriever, RelatedNote, RetrievalConfig, ScoredChunk, SCORE_NORMALIZATION,
};
use crate::storage::{DocumentChunk, DocumentStore, IndexMeta};
use crate::sync::{CancelFlag, FilesStatus, IndexEvent, IndexReport, IndexSync};
use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use tokio::sync::{Mutex, MutexGuard, OnceCell};
use tracing::{debug, info, warn};

type Observer = Arc<dyn Fn(&IndexEvent) + Send + Sync>;

/// Orchestrates indexing and retrieval over one document store
pub struct VectorStoreManager {
    db_path: PathBuf,
    batch_size: usize,
    provider: Arc<dyn EmbeddingProvider>,
    corpus: Arc<dyn Corpus>,
    chunker: Arc<dyn Chunker>,
    store: OnceCell<Arc<DocumentStore>>,
    index_lock: Mutex<()>,
    cancel: CancelFlag,
    observers: RwLock<Vec<Observer>>,
}

impl VectorStoreManager {
    pub fn new(
        db_path: PathBuf,
        batch_size: usize,
        provider: Arc<dyn EmbeddingProvider>,
        corpus: Arc<dyn Corpus>,
        chunker: Arc<dyn Chunker>,
    ) -> Self {
        Self {
            db_path,
            batch_size,
            provider,
            corpus,
            chunker,
            store: OnceCell::new(),
            index_lock: Mutex::new(()),
            cancel: CancelFlag::new(),
            observers: RwLock::new(Vec::new()),
        }
    }

    /// Build a manager over the configured filesystem corpus
    ///
    /// The provider must produce vectors of the configured dimension.
    pub fn from_config(config: &Config, provider: Arc<dyn EmbeddingProvider>) -> Result<Self> {
        if provider.dimension() != config.embedding.dimension {
            return Err(VaultdexError::Configuration(format!(
                "Model {} produces {}D embeddings but embedding.dimension is {}",
                provider.model_name(),
                provider.dimension(),
                config.embedding.dimension
            )));
        }

        let corpus = FsCorpus::new(
            crate::config::expand_path(&config.corpus.root),
            config.corpus.extensions.clone(),
            config.corpus.exclude.clone(),
        );

        Ok(Self::new(
            config.database_path(),
            config.embedding.batch_size,
            provider,
            Arc::new(corpus),
            Arc::new(TextChunker::new(config.chunking.max_chunk_size)),
        ))
    }

    /// Register a callback for index progress and completion events
    ///
    /// Callbacks run on the indexing task and may register further observers;
    /// those start receiving events from the next one emitted.
    pub fn on_event<F>(&self, observer: F)
    where
        F: Fn(&IndexEvent) + Send + Sync + 'static,
    {
        match self.observers.write() {
            Ok(mut observers) => observers.push(Arc::new(observer)),
            Err(_) => warn!("Observer list poisoned; observer not registered"),
        }
    }

    fn emit(&self, event: &IndexEvent) {
        // Snapshot so callbacks run without the lock held
        let observers: Vec<Observer> = match self.observers.read() {
            Ok(observers) => observers.clone(),
            Err(_) => return,
        };
        for observer in &observers {
            observer(event);
        }
    }

    fn index_meta(&self) -> IndexMeta {
        IndexMeta {
            embedding_dimension: self.provider.dimension(),
            embedding_model: self.provider.model_name().to_string(),
            score_normalization: SCORE_NORMALIZATION.to_string(),
        }
    }

    /// The document store, opened on first use
    pub async fn get_db(&self) -> Result<Arc<DocumentStore>> {
        self.store
            .get_or_try_init(|| async {
                if let Some(parent) = self.db_path.parent() {
                    std::fs::create_dir_all(parent).map_err(|e| VaultdexError::Io {
                        source: e,
                        context: format!("Failed to create data directory: {:?}", parent),
                    })?;
                }
                let store = DocumentStore::open(&self.db_path, self.index_meta())?;
                Ok::<_, VaultdexError>(Arc::new(store))
            })
            .await
            .cloned()
    }

    /// Sync operations bound to the document store
    pub async fn get_db_ops(&self) -> Result<IndexSync> {
        let store = self.get_db().await?;
        Ok(IndexSync::new(
            store,
            self.corpus.clone(),
            self.chunker.clone(),
            BatchProcessor::new(
                self.provider.clone(),
                self.batch_size,
                self.provider.dimension(),
            ),
        ))
    }

    fn begin(&self, operation: &'static str) -> Result<MutexGuard<'_, ()>> {
        self.index_lock.try_lock().map_err(|_| {
            debug!("Rejected {}: another index operation is running", operation);
            VaultdexError::Busy { operation }
        })
    }

    /// True while a mutating operation holds the index
    pub fn is_indexing(&self) -> bool {
        self.index_lock.try_lock().is_err()
    }

    /// Bring the index up to date with the corpus
    pub async fn index_vault_to_vector_store(&self, force: bool) -> Result<IndexReport> {
        let _guard = self.begin("index")?;
        self.cancel.reset();

        let ops = self.get_db_ops().await?;
        let notify = |event: &IndexEvent| self.emit(event);
        let report = ops.index_to_store(force, &self.cancel, &notify).await?;

        self.emit(&IndexEvent::IndexFinished(report.clone()));
        Ok(report)
    }

    /// Drop index entries for files that left the corpus
    pub async fn garbage_collect_vector_store(&self) -> Result<usize> {
        let _guard = self.begin("garbage collect")?;
        let removed = self.get_db_ops().await?.garbage_collect()?;
        self.emit(&IndexEvent::GarbageCollected { removed });
        Ok(removed)
    }

    /// Remove every entry from the index; callers confirm beforehand
    pub async fn clear_index(&self) -> Result<()> {
        let _guard = self.begin("clear")?;
        self.get_db_ops().await?.clear_index()?;
        self.emit(&IndexEvent::IndexCleared);
        Ok(())
    }

    /// Remove the given paths and save once; returns how many were indexed
    pub async fn remove_docs(&self, paths: &[String]) -> Result<usize> {
        let _guard = self.begin("remove documents")?;
        let store = self.get_db().await?;

        let mut removed = 0;
        for path in paths {
            if store.remove_docs(path)? {
                removed += 1;
            }
        }
        if removed > 0 {
            store.save()?;
        }

        info!("Removed {} of {} requested documents", removed, paths.len());
        self.emit(&IndexEvent::DocsRemoved { removed });
        Ok(removed)
    }

    pub async fn get_indexed_files(&self) -> Result<Vec<String>> {
        self.get_db().await?.list_indexed_paths()
    }

    /// Stored chunks of each path, in offset order; empty when not indexed
    pub async fn get_docs(&self, paths: &[String]) -> Result<Vec<(String, Vec<DocumentChunk>)>> {
        let store = self.get_db().await?;
        paths
            .iter()
            .map(|path| Ok((path.clone(), store.get(path)?)))
            .collect()
    }

    pub async fn has_embeddings(&self, path: &str) -> Result<bool> {
        self.get_db().await?.has_embeddings(path)
    }

    pub async fn files_status(&self) -> Result<FilesStatus> {
        self.get_db_ops().await?.files_status()
    }

    pub async fn retrieve(
        &self,
        query: &str,
        salient_terms: &[String],
        config: &RetrievalConfig,
    ) -> Result<Vec<ScoredChunk>> {
        let retriever = HybridRetriever::new(self.get_db().await?, self.provider.clone());
        retriever.retrieve(query, salient_terms, config)
    }

    pub async fn find_relevant_notes(
        &self,
        path: &str,
        config: &RetrievalConfig,
    ) -> Result<Vec<RelatedNote>> {
        let retriever = HybridRetriever::new(self.get_db().await?, self.provider.clone());
        retriever.find_relevant_notes(path, config)
    }

    /// Ask an in-flight index run to stop after the current provider batch
    pub fn cancel_indexing(&self) {
        self.cancel.cancel();
    }

    /// Stop any index run, wait for it to finish, and flush pending state
    pub async fn on_unload(&self) -> Result<()> {
        self.cancel.cancel();
        let _guard = self.index_lock.lock().await;

        if let Some(store) = self.store.get() {
            let written = store.save()?;
            debug!("Flushed {} documents on unload", written);
        }
        info!("Vector store manager unloaded");
        Ok(())
    }
}
