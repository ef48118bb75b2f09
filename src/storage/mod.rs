//! Document store for indexed chunks
//!
//! Keeps the whole index in memory, keyed by path, and persists it to
//! SQLite on `save()`. Mutations are visible to readers immediately but only
//! survive a restart once saved. Each path's chunk list is swapped as one
//! `Arc`, so readers see either the old or the new set, never a mix.

pub mod chunk;
pub mod database;

use crate::error::{Result, VaultdexError};
use ahash::{HashSet, HashSetExt};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

pub use chunk::{chunk_id, hash_content, ChunkSummary, DocumentChunk, Metadata, MetadataValue};
pub use database::{Database, DbPool, DbStats, IndexMeta, SaveBatch};

/// Shared, immutable chunk list for one path
pub type ChunkSet = Arc<Vec<DocumentChunk>>;

#[derive(Default)]
struct StoreState {
    docs: BTreeMap<String, ChunkSet>,
    dirty: HashSet<String>,
    cleared: bool,
}

/// Path-keyed chunk store backed by SQLite
pub struct DocumentStore {
    database: Database,
    meta: IndexMeta,
    state: RwLock<StoreState>,
}

impl DocumentStore {
    /// Open the store at `db_path` and load every persisted chunk
    ///
    /// Fails with a configuration error when the persisted index was built
    /// with a different embedding dimension, model or score normalization.
    pub fn open(db_path: &Path, meta: IndexMeta) -> Result<Self> {
        let database = Database::new(db_path)?;

        // Refuse an index built under other settings
        if let Some(stored) = database.read_meta()? {
            if stored != meta {
                return Err(VaultdexError::Configuration(format!(
                    "Index at {} was built with {} ({}D, {}) but the current configuration uses {} ({}D, {}); clear the index to switch",
                    db_path.display(),
                    stored.embedding_model,
                    stored.embedding_dimension,
                    stored.score_normalization,
                    meta.embedding_model,
                    meta.embedding_dimension,
                    meta.score_normalization,
                )));
            }
        }

        // Load persisted chunks grouped by path
        let mut grouped: BTreeMap<String, Vec<DocumentChunk>> = BTreeMap::new();
        for chunk in database.load_chunks()? {
            if chunk.has_embedding() && chunk.embedding.len() != meta.embedding_dimension {
                return Err(VaultdexError::Storage(format!(
                    "Chunk {} has a {}D embedding in a {}D index",
                    chunk.id,
                    chunk.embedding.len(),
                    meta.embedding_dimension
                )));
            }
            grouped.entry(chunk.path.clone()).or_default().push(chunk);
        }

        tracing::info!(
            "Loaded document store from {} ({} documents)",
            db_path.display(),
            grouped.len()
        );

        let docs = grouped
            .into_iter()
            .map(|(path, chunks)| (path, Arc::new(chunks)))
            .collect();

        Ok(Self {
            database,
            meta,
            state: RwLock::new(StoreState {
                docs,
                dirty: HashSet::new(),
                cleared: false,
            }),
        })
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, StoreState>> {
        self.state
            .read()
            .map_err(|_| VaultdexError::Storage("Document store lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, StoreState>> {
        self.state
            .write()
            .map_err(|_| VaultdexError::Storage("Document store lock poisoned".to_string()))
    }

    pub fn meta(&self) -> &IndexMeta {
        &self.meta
    }

    pub fn dimension(&self) -> usize {
        self.meta.embedding_dimension
    }

    /// All chunks for `path`; empty when the path is not indexed
    pub fn get(&self, path: &str) -> Result<Vec<DocumentChunk>> {
        Ok(self
            .read()?
            .docs
            .get(path)
            .map(|chunks| chunks.to_vec())
            .unwrap_or_default())
    }

    /// True iff at least one chunk for `path` carries an embedding
    pub fn has_embeddings(&self, path: &str) -> Result<bool> {
        Ok(self
            .read()?
            .docs
            .get(path)
            .is_some_and(|chunks| chunks.iter().any(DocumentChunk::has_embedding)))
    }

    /// Replace every chunk stored for `path`
    ///
    /// An empty `chunks` removes the path. Chunks must all belong to `path`,
    /// have unique ids, and carry either no embedding or one of the index
    /// dimension.
    pub fn upsert(&self, path: &str, chunks: Vec<DocumentChunk>) -> Result<()> {
        let mut ids = HashSet::with_capacity(chunks.len());
        for chunk in &chunks {
            if chunk.path != path {
                return Err(VaultdexError::Storage(format!(
                    "Chunk {} belongs to {} but was upserted under {}",
                    chunk.id, chunk.path, path
                )));
            }
            if !ids.insert(chunk.id.as_str()) {
                return Err(VaultdexError::Storage(format!(
                    "Duplicate chunk id {} for {}",
                    chunk.id, path
                )));
            }
            if chunk.has_embedding() && chunk.embedding.len() != self.meta.embedding_dimension {
                return Err(VaultdexError::Configuration(format!(
                    "Embedding dimension mismatch for {}: expected {}, got {}",
                    path,
                    self.meta.embedding_dimension,
                    chunk.embedding.len()
                )));
            }
        }

        let mut state = self.write()?;
        // Empty replacement deletes the path
        if chunks.is_empty() {
            state.docs.remove(path);
        } else {
            state.docs.insert(path.to_string(), Arc::new(chunks));
        }
        state.dirty.insert(path.to_string());
        Ok(())
    }

    /// Refresh the stored mtime of an unchanged file without re-embedding
    pub fn touch(&self, path: &str, mtime: i64) -> Result<bool> {
        let mut state = self.write()?;
        let Some(existing) = state.docs.get(path) else {
            return Ok(false);
        };
        if existing.iter().all(|c| c.mtime == mtime) {
            return Ok(false);
        }

        let updated: Vec<DocumentChunk> = existing
            .iter()
            .cloned()
            .map(|mut c| {
                c.mtime = mtime;
                c
            })
            .collect();
        state.docs.insert(path.to_string(), Arc::new(updated));
        state.dirty.insert(path.to_string());
        Ok(true)
    }

    /// Delete every chunk for `path`; returns whether anything was removed
    pub fn remove_docs(&self, path: &str) -> Result<bool> {
        let mut state = self.write()?;
        let removed = state.docs.remove(path).is_some();
        if removed {
            state.dirty.insert(path.to_string());
        }
        Ok(removed)
    }

    /// Distinct indexed paths, sorted
    pub fn list_indexed_paths(&self) -> Result<Vec<String>> {
        Ok(self.read()?.docs.keys().cloned().collect())
    }

    /// `(path, mtime, source_hash)` for every indexed path
    pub fn snapshot_entries(&self) -> Result<Vec<(String, i64, String)>> {
        Ok(self
            .read()?
            .docs
            .iter()
            .filter_map(|(path, chunks)| {
                chunks
                    .first()
                    .map(|c| (path.clone(), c.mtime, c.source_hash.clone()))
            })
            .collect())
    }

    /// Every chunk set currently held, in path order
    pub fn chunk_sets(&self) -> Result<Vec<ChunkSet>> {
        Ok(self.read()?.docs.values().cloned().collect())
    }

    pub fn document_count(&self) -> Result<usize> {
        Ok(self.read()?.docs.len())
    }

    pub fn chunk_count(&self) -> Result<usize> {
        Ok(self.read()?.docs.values().map(|c| c.len()).sum())
    }

    /// Remove all chunks
    pub fn clear(&self) -> Result<()> {
        let mut state = self.write()?;
        state.docs.clear();
        state.dirty.clear();
        state.cleared = true;
        Ok(())
    }

    /// True when there are mutations not yet saved
    pub fn has_pending_changes(&self) -> Result<bool> {
        let state = self.read()?;
        Ok(state.cleared || !state.dirty.is_empty())
    }

    /// Flush pending mutations to SQLite in one transaction
    ///
    /// Returns the number of paths written. On failure the pending set is
    /// kept so a later save can retry.
    pub fn save(&self) -> Result<usize> {
        // Drain the pending set; the transaction runs without the lock
        let batch = {
            let mut state = self.write()?;
            let dirty: Vec<String> = state.dirty.drain().collect();
            let replace = dirty
                .into_iter()
                .map(|path| {
                    let chunks = state.docs.get(&path).cloned().unwrap_or_default();
                    (path, chunks)
                })
                .collect();
            let batch = SaveBatch {
                clear_all: state.cleared,
                replace,
            };
            state.cleared = false;
            batch
        };

        if batch.is_empty() {
            return Ok(0);
        }

        let written = batch.replace.len();
        if let Err(e) = self.database.write_batch(&batch, &self.meta) {
            tracing::error!("Failed to save document store: {}", e);
            // Put the paths back for the next save
            let mut state = self.write()?;
            state.cleared |= batch.clear_all;
            state
                .dirty
                .extend(batch.replace.into_iter().map(|(path, _)| path));
            return Err(e);
        }

        tracing::debug!("Saved {} changed documents", written);
        Ok(written)
    }

    /// Durable-layer statistics
    pub fn stats(&self) -> Result<DbStats> {
        self.database.stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn meta(dim: usize) -> IndexMeta {
        IndexMeta {
            embedding_dimension: dim,
            embedding_model: "test-model".to_string(),
            score_normalization: "cosine-shifted-v1".to_string(),
        }
    }

    fn chunk(path: &str, offset: usize, text: &str, embedding: Vec<f32>) -> DocumentChunk {
        DocumentChunk::new(path, offset, text, hash_content(text), 100, Metadata::new())
            .with_embedding(embedding)
    }

    fn open(temp: &TempDir) -> DocumentStore {
        DocumentStore::open(&temp.path().join("index.sqlite"), meta(2)).unwrap()
    }

    #[test]
    fn test_get_missing_path_is_empty() {
        let temp = TempDir::new().unwrap();
        let store = open(&temp);
        assert!(store.get("nope.md").unwrap().is_empty());
        assert!(!store.has_embeddings("nope.md").unwrap());
    }

    #[test]
    fn test_upsert_replaces_all_chunks() {
        let temp = TempDir::new().unwrap();
        let store = open(&temp);

        store
            .upsert(
                "A.md",
                vec![
                    chunk("A.md", 0, "one", vec![1.0, 0.0]),
                    chunk("A.md", 4, "two", vec![0.0, 1.0]),
                ],
            )
            .unwrap();
        assert_eq!(store.get("A.md").unwrap().len(), 2);

        store
            .upsert("A.md", vec![chunk("A.md", 0, "only", vec![1.0, 1.0])])
            .unwrap();
        let chunks = store.get("A.md").unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].content, "only");
    }

    #[test]
    fn test_upsert_rejects_foreign_and_duplicate_chunks() {
        let temp = TempDir::new().unwrap();
        let store = open(&temp);

        let foreign = store.upsert("A.md", vec![chunk("B.md", 0, "b", vec![])]);
        assert!(matches!(foreign, Err(VaultdexError::Storage(_))));

        let dup = store.upsert(
            "A.md",
            vec![chunk("A.md", 0, "x", vec![]), chunk("A.md", 0, "y", vec![])],
        );
        assert!(matches!(dup, Err(VaultdexError::Storage(_))));
        assert!(store.get("A.md").unwrap().is_empty());
    }

    #[test]
    fn test_upsert_rejects_wrong_dimension() {
        let temp = TempDir::new().unwrap();
        let store = open(&temp);

        let result = store.upsert("A.md", vec![chunk("A.md", 0, "a", vec![1.0, 2.0, 3.0])]);
        assert!(matches!(result, Err(VaultdexError::Configuration(_))));
    }

    #[test]
    fn test_has_embeddings_tracks_empty_vectors() {
        let temp = TempDir::new().unwrap();
        let store = open(&temp);

        store
            .upsert("A.md", vec![chunk("A.md", 0, "a", vec![])])
            .unwrap();
        assert!(!store.has_embeddings("A.md").unwrap());
        assert_eq!(store.list_indexed_paths().unwrap(), vec!["A.md"]);

        store
            .upsert("A.md", vec![chunk("A.md", 0, "a", vec![0.5, 0.5])])
            .unwrap();
        assert!(store.has_embeddings("A.md").unwrap());
    }

    #[test]
    fn test_remove_missing_path_is_noop() {
        let temp = TempDir::new().unwrap();
        let store = open(&temp);
        assert!(!store.remove_docs("ghost.md").unwrap());
        assert!(!store.has_pending_changes().unwrap());
    }

    #[test]
    fn test_unsaved_changes_do_not_survive_reopen() {
        let temp = TempDir::new().unwrap();
        {
            let store = open(&temp);
            store
                .upsert("A.md", vec![chunk("A.md", 0, "a", vec![1.0, 0.0])])
                .unwrap();
            assert_eq!(store.save().unwrap(), 1);

            store
                .upsert("B.md", vec![chunk("B.md", 0, "b", vec![0.0, 1.0])])
                .unwrap();
            assert_eq!(store.list_indexed_paths().unwrap(), vec!["A.md", "B.md"]);
        }

        let store = open(&temp);
        assert_eq!(store.list_indexed_paths().unwrap(), vec!["A.md"]);
    }

    #[test]
    fn test_clear_then_save_empties_database() {
        let temp = TempDir::new().unwrap();
        {
            let store = open(&temp);
            store
                .upsert("A.md", vec![chunk("A.md", 0, "a", vec![1.0, 0.0])])
                .unwrap();
            store.save().unwrap();
            store.clear().unwrap();
            assert!(store.has_pending_changes().unwrap());
            store.save().unwrap();
            assert_eq!(store.stats().unwrap().chunk_count, 0);
        }

        let store = open(&temp);
        assert_eq!(store.document_count().unwrap(), 0);
    }

    #[test]
    fn test_touch_updates_mtime_only() {
        let temp = TempDir::new().unwrap();
        let store = open(&temp);
        store
            .upsert("A.md", vec![chunk("A.md", 0, "a", vec![1.0, 0.0])])
            .unwrap();
        store.save().unwrap();

        assert!(store.touch("A.md", 200).unwrap());
        assert!(!store.touch("A.md", 200).unwrap());
        assert!(!store.touch("missing.md", 200).unwrap());

        let chunks = store.get("A.md").unwrap();
        assert_eq!(chunks[0].mtime, 200);
        assert_eq!(chunks[0].embedding, vec![1.0, 0.0]);
    }

    #[test]
    fn test_reopen_with_other_dimension_is_rejected() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("index.sqlite");
        {
            let store = DocumentStore::open(&path, meta(2)).unwrap();
            store
                .upsert("A.md", vec![chunk("A.md", 0, "a", vec![1.0, 0.0])])
                .unwrap();
            store.save().unwrap();
        }

        let result = DocumentStore::open(&path, meta(3));
        assert!(matches!(result, Err(VaultdexError::Configuration(_))));
    }
}
