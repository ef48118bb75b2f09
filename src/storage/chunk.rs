//! Indexed chunk records and content hashing
//!
//! Hashes are BLAKE3 truncated to 32 hex characters. Chunk ids hash the
//! source path together with the chunk's byte offset, so re-indexing an
//! unchanged file produces the same ids.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Scalar value carried in chunk metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl From<&str> for MetadataValue {
    fn from(value: &str) -> Self {
        MetadataValue::Text(value.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(value: String) -> Self {
        MetadataValue::Text(value)
    }
}

impl From<f64> for MetadataValue {
    fn from(value: f64) -> Self {
        MetadataValue::Number(value)
    }
}

impl From<usize> for MetadataValue {
    fn from(value: usize) -> Self {
        MetadataValue::Number(value as f64)
    }
}

impl From<bool> for MetadataValue {
    fn from(value: bool) -> Self {
        MetadataValue::Bool(value)
    }
}

/// Open metadata bag, passed through to results and never scored
pub type Metadata = BTreeMap<String, MetadataValue>;

/// One indexed slice of a source file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentChunk {
    /// Stable id derived from path and byte offset
    pub id: String,

    /// Source file path, relative to the corpus root
    pub path: String,

    /// Byte offset of the chunk inside the source file
    pub offset: usize,

    /// Chunk text
    pub content: String,

    /// Embedding vector; empty when embedding has not succeeded yet
    #[serde(default)]
    pub embedding: Vec<f32>,

    /// Hash of `content`
    pub content_hash: String,

    /// Hash of the whole source file when this chunk was produced
    pub source_hash: String,

    /// Source file mtime (ms since epoch) at index time
    pub mtime: i64,

    #[serde(default)]
    pub metadata: Metadata,
}

impl DocumentChunk {
    /// Build an unembedded chunk
    pub fn new(
        path: impl Into<String>,
        offset: usize,
        content: impl Into<String>,
        source_hash: impl Into<String>,
        mtime: i64,
        metadata: Metadata,
    ) -> Self {
        let path = path.into();
        let content = content.into();
        Self {
            id: chunk_id(&path, offset),
            content_hash: hash_content(&content),
            path,
            offset,
            content,
            embedding: Vec::new(),
            source_hash: source_hash.into(),
            mtime,
            metadata,
        }
    }

    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = embedding;
        self
    }

    pub fn has_embedding(&self) -> bool {
        !self.embedding.is_empty()
    }

    /// First `max_chars` characters of the trimmed content
    pub fn preview(&self, max_chars: usize) -> String {
        let text = self.content.trim();
        match text.char_indices().nth(max_chars) {
            Some((cut, _)) => format!("{}...", &text[..cut]),
            None => text.to_string(),
        }
    }

    /// Stored fields without the vector, for inspection output
    pub fn summary(&self, preview_chars: usize) -> ChunkSummary {
        ChunkSummary {
            id: self.id.clone(),
            offset: self.offset,
            content_hash: self.content_hash.clone(),
            mtime: self.mtime,
            embedding_len: self.embedding.len(),
            metadata: self.metadata.clone(),
            preview: self.preview(preview_chars),
        }
    }
}

/// What `inspect` shows for one stored chunk
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChunkSummary {
    pub id: String,
    pub offset: usize,
    pub content_hash: String,
    pub mtime: i64,
    pub embedding_len: usize,
    pub metadata: Metadata,
    pub preview: String,
}

/// Hash text content (BLAKE3, 32 hex characters)
pub fn hash_content(content: &str) -> String {
    let hash = blake3::hash(content.as_bytes());
    hash.to_hex()[..32].to_string()
}

/// Deterministic chunk id for a path and byte offset
pub fn chunk_id(path: &str, offset: usize) -> String {
    hash_content(&format!("{}#{}", path, offset))
}
