/// Batched embedding of one file's chunks
use super::{EmbeddingError, EmbeddingProvider};
use std::sync::Arc;
use tracing::debug;

/// Outcome of embedding a set of chunk texts
#[derive(Debug)]
pub enum BatchOutcome {
    /// One vector per input text, in input order
    Complete(Vec<Vec<f32>>),
    /// Stop was requested before every batch was sent
    Interrupted,
}

/// Splits chunk texts into provider batches and checks what comes back
///
/// All-or-nothing: either every text gets a vector of the expected
/// dimension or the whole call fails, so callers never store a file
/// with a mix of embedded and unembedded chunks.
pub struct BatchProcessor {
    provider: Arc<dyn EmbeddingProvider>,
    batch_size: usize,
    dimension: usize,
}

impl BatchProcessor {
    /// Create a new batch processor
    ///
    /// # Arguments
    /// * `provider` - Embedding provider
    /// * `batch_size` - Number of texts sent to the provider per call
    /// * `dimension` - Dimension the index was created with
    pub fn new(provider: Arc<dyn EmbeddingProvider>, batch_size: usize, dimension: usize) -> Self {
        Self {
            provider,
            batch_size: batch_size.max(1),
            dimension,
        }
    }

    /// Embed every text, checking `should_stop` before each provider call
    pub fn process(
        &self,
        texts: &[String],
        should_stop: impl Fn() -> bool,
    ) -> Result<BatchOutcome, EmbeddingError> {
        let mut vectors = Vec::with_capacity(texts.len());

        for batch in texts.chunks(self.batch_size) {
            if should_stop() {
                debug!(
                    "Stop requested after {} of {} texts",
                    vectors.len(),
                    texts.len()
                );
                return Ok(BatchOutcome::Interrupted);
            }

            let embeddings = self.provider.embed_batch(batch)?;

            if embeddings.len() != batch.len() {
                return Err(EmbeddingError::GenerationError(format!(
                    "Embedding count mismatch: expected {}, got {}",
                    batch.len(),
                    embeddings.len()
                )));
            }

            for embedding in embeddings {
                if embedding.len() != self.dimension {
                    return Err(EmbeddingError::DimensionMismatch {
                        expected: self.dimension,
                        actual: embedding.len(),
                    });
                }
                vectors.push(embedding);
            }
        }

        Ok(BatchOutcome::Complete(vectors))
    }
}
