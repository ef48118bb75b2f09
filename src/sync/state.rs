//! Per-file index state

use serde::Serialize;

/// What the store currently believes about one path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredEntry {
    pub mtime: i64,
    pub source_hash: String,
    pub has_embeddings: bool,
}

/// Where a file stands relative to the index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileState {
    /// In the corpus, absent from the store
    Untracked,
    /// Stored with embeddings and a matching content hash
    Indexed,
    /// Stored, but content changed or embeddings are missing
    Stale,
    /// Stored, but gone from the corpus
    Missing,
}

impl FileState {
    /// True when an incremental run has to (re-)embed the file
    pub fn needs_indexing(self) -> bool {
        matches!(self, FileState::Untracked | FileState::Stale)
    }
}

/// Classify a path from its stored entry and its current content hash
///
/// `current_hash` is `None` when the path is no longer in the corpus.
pub fn classify(stored: Option<&StoredEntry>, current_hash: Option<&str>) -> FileState {
    match (stored, current_hash) {
        (None, _) => FileState::Untracked,
        (Some(_), None) => FileState::Missing,
        (Some(entry), Some(hash)) => {
            if entry.has_embeddings && entry.source_hash == hash {
                FileState::Indexed
            } else {
                FileState::Stale
            }
        }
    }
}
