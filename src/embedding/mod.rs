/// Embedding generation
///
/// - EmbeddingProvider trait so the index never depends on one backend
/// - FastEmbedProvider for local embedding (all-MiniLM-L6-v2, 384-dim)
/// - BatchProcessor to embed one file's chunks in provider-sized batches
mod batch;
mod provider;

pub use batch::{BatchOutcome, BatchProcessor};
pub use provider::{EmbeddingError, EmbeddingProvider, FastEmbedProvider};
