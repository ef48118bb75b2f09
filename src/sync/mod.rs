//! Index sync engine
//!
//! Reconciles the document store with the live corpus. Work is per file:
//! only untracked or stale files are chunked and embedded, removals are
//! per-path, and the store is saved once at the end of each operation.

mod report;
mod state;

pub use report::{FileFailure, FilesStatus, IndexEvent, IndexReport};
pub use state::{classify, FileState, StoredEntry};

use crate::chunking::Chunker;
use crate::corpus::Corpus;
use crate::embedding::{BatchOutcome, BatchProcessor, EmbeddingError};
use crate::error::{Result, VaultdexError};
use crate::storage::{hash_content, DocumentChunk, DocumentStore};
use ahash::{HashMap, HashMapExt, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Shared stop request for long-running index passes
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Result of processing one file
enum FileOutcome {
    Indexed(usize),
    Failed(String),
    Interrupted,
}

/// Reconciles a document store against a corpus
pub struct IndexSync {
    store: Arc<DocumentStore>,
    corpus: Arc<dyn Corpus>,
    chunker: Arc<dyn Chunker>,
    embedder: BatchProcessor,
}

impl IndexSync {
    pub fn new(
        store: Arc<DocumentStore>,
        corpus: Arc<dyn Corpus>,
        chunker: Arc<dyn Chunker>,
        embedder: BatchProcessor,
    ) -> Self {
        Self {
            store,
            corpus,
            chunker,
            embedder,
        }
    }

    fn stored_entries(&self) -> Result<HashMap<String, StoredEntry>> {
        let entries = self.store.snapshot_entries()?;
        let mut map = HashMap::with_capacity(entries.len());
        for (path, mtime, source_hash) in entries {
            let has_embeddings = self.store.has_embeddings(&path)?;
            map.insert(
                path,
                StoredEntry {
                    mtime,
                    source_hash,
                    has_embeddings,
                },
            );
        }
        Ok(map)
    }

    /// Bring the store up to date with the corpus
    ///
    /// With `force`, every non-empty file is re-chunked and re-embedded.
    /// Per-file failures are recorded in the report and the run continues.
    /// Cancellation stops before the next provider call; completed files
    /// are saved either way.
    pub async fn index_to_store(
        &self,
        force: bool,
        cancel: &CancelFlag,
        on_event: &(dyn Fn(&IndexEvent) + Send + Sync),
    ) -> Result<IndexReport> {
        let listing = self.corpus.list_files()?;
        if !listing.is_complete() {
            warn!(
                "{} corpus entries could not be read; files beneath them are left as they are",
                listing.skipped.len()
            );
        }
        let files = listing.files;
        let stored = self.stored_entries()?;
        let mut report = IndexReport::default();

        info!(
            "Indexing {} corpus files ({} already in store, force={})",
            files.len(),
            stored.len(),
            force
        );
        on_event(&IndexEvent::IndexStarted {
            force,
            files: files.len(),
        });

        for file in &files {
            if cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }

            let content = match self.corpus.read_content(&file.path) {
                Ok(content) => content,
                Err(e) => {
                    warn!("Skipping unreadable file {}: {}", file.path, e);
                    report.record_failure(&file.path, e.to_string());
                    continue;
                }
            };

            let entry = stored.get(&file.path);

            if content.trim().is_empty() {
                if entry.is_some() && self.store.remove_docs(&file.path)? {
                    debug!("Dropped chunks of emptied file {}", file.path);
                    report.removed_empty += 1;
                }
                continue;
            }

            let source_hash = hash_content(&content);
            let state = classify(entry, Some(&source_hash));

            if !force && !state.needs_indexing() {
                if entry.is_some_and(|e| e.mtime != file.mtime) {
                    self.store.touch(&file.path, file.mtime)?;
                }
                report.skipped += 1;
                continue;
            }

            debug!("Indexing {} ({:?})", file.path, state);

            match self.index_file(&file.path, file.mtime, &content, &source_hash, cancel)? {
                FileOutcome::Indexed(chunks) => {
                    report.processed += 1;
                    on_event(&IndexEvent::FileIndexed {
                        path: file.path.clone(),
                        chunks,
                    });
                }
                FileOutcome::Failed(reason) => {
                    warn!("Embedding failed for {}: {}", file.path, reason);
                    on_event(&IndexEvent::FileFailed {
                        path: file.path.clone(),
                        reason: reason.clone(),
                    });
                    report.record_failure(&file.path, reason);
                }
                FileOutcome::Interrupted => {
                    report.cancelled = true;
                    break;
                }
            }

            tokio::task::yield_now().await;
        }

        self.store.save()?;

        info!(
            "Index run finished: {} processed, {} skipped, {} failed{}",
            report.processed,
            report.skipped,
            report.failed,
            if report.cancelled { " (cancelled)" } else { "" }
        );

        Ok(report)
    }

    /// Chunk, embed and store one file; all-or-nothing for the path
    fn index_file(
        &self,
        path: &str,
        mtime: i64,
        content: &str,
        source_hash: &str,
        cancel: &CancelFlag,
    ) -> Result<FileOutcome> {
        let chunks: Vec<DocumentChunk> = self
            .chunker
            .chunk(path, content)
            .into_iter()
            .map(|draft| {
                DocumentChunk::new(
                    path,
                    draft.offset,
                    draft.content,
                    source_hash,
                    mtime,
                    draft.metadata,
                )
            })
            .collect();

        if chunks.is_empty() {
            return Ok(FileOutcome::Failed("chunker produced no chunks".to_string()));
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();

        match self.embedder.process(&texts, || cancel.is_cancelled()) {
            Ok(BatchOutcome::Complete(vectors)) => {
                let count = chunks.len();
                let chunks = chunks
                    .into_iter()
                    .zip(vectors)
                    .map(|(chunk, vector)| chunk.with_embedding(vector))
                    .collect();
                self.store.upsert(path, chunks)?;
                Ok(FileOutcome::Indexed(count))
            }
            Ok(BatchOutcome::Interrupted) => Ok(FileOutcome::Interrupted),
            Err(e) if e.is_fatal() => {
                // Keep what earlier files produced before bailing out
                self.store.save()?;
                match e {
                    EmbeddingError::DimensionMismatch { .. } => {
                        Err(VaultdexError::Configuration(e.to_string()))
                    }
                    other => Err(other.into()),
                }
            }
            Err(e) => {
                // Good embeddings stay until a later run succeeds; otherwise keep
                // the new text searchable lexically with empty vectors
                if !self.store.has_embeddings(path)? {
                    self.store.upsert(path, chunks)?;
                }
                Ok(FileOutcome::Failed(e.to_string()))
            }
        }
    }

    /// Remove stored paths that are no longer in the corpus
    ///
    /// Refuses to run on an incomplete listing, since paths under an
    /// unreadable directory would look deleted.
    pub fn garbage_collect(&self) -> Result<usize> {
        let listing = self.corpus.list_files()?;
        if !listing.is_complete() {
            warn!(
                "Garbage collection aborted: {} corpus entries could not be read",
                listing.skipped.len()
            );
            return Err(VaultdexError::IncompleteListing {
                skipped: listing.skipped.len(),
            });
        }

        let live: HashSet<String> = listing
            .files
            .into_iter()
            .map(|f| f.path)
            .collect();

        let mut removed = 0;
        for path in self.store.list_indexed_paths()? {
            if !live.contains(&path) && self.store.remove_docs(&path)? {
                debug!("Garbage collected {}", path);
                removed += 1;
            }
        }

        if removed > 0 {
            self.store.save()?;
        }
        info!("Garbage collection removed {} documents", removed);
        Ok(removed)
    }

    /// Remove everything from the index and persist the empty state
    pub fn clear_index(&self) -> Result<()> {
        self.store.clear()?;
        self.store.save()?;
        info!("Index cleared");
        Ok(())
    }

    /// Indexed paths, sorted
    pub fn indexed_files(&self) -> Result<Vec<String>> {
        self.store.list_indexed_paths()
    }

    /// Classify every corpus file as indexed, unindexed or empty
    pub fn files_status(&self) -> Result<FilesStatus> {
        let indexed = self.store.list_indexed_paths()?;
        let indexed_set: HashSet<&str> = indexed.iter().map(String::as_str).collect();
        let mut status = FilesStatus::default();

        for file in self.corpus.list_files()?.files {
            let content = match self.corpus.read_content(&file.path) {
                Ok(content) => content,
                Err(e) => {
                    debug!("Cannot read {} for status: {}", file.path, e);
                    status.unreadable.push(file.path);
                    continue;
                }
            };
            if content.trim().is_empty() {
                status.empty.push(file.path);
            } else if !indexed_set.contains(file.path.as_str()) {
                status.unindexed.push(file.path);
            } else if !self.store.has_embeddings(&file.path)? {
                status.missing_embeddings.push(file.path);
            }
        }

        status.unindexed.sort();
        status.empty.sort();
        status.missing_embeddings.sort();
        status.unreadable.sort();
        status.indexed = indexed;
        Ok(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_flag_is_shared() {
        let flag = CancelFlag::new();
        let other = flag.clone();
        assert!(!other.is_cancelled());

        flag.cancel();
        assert!(other.is_cancelled());

        other.reset();
        assert!(!flag.is_cancelled());
    }
}
