use crate::config::Config;
use crate::error::{Result, ValidationError, VaultdexError};

/// Configuration validator
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the configuration, reporting every problem at once
    pub fn validate(config: &Config) -> Result<()> {
        let mut errors = Vec::new();

        Self::validate_schema_version(config, &mut errors);
        Self::validate_storage(config, &mut errors);
        Self::validate_corpus(config, &mut errors);
        Self::validate_embedding(config, &mut errors);
        Self::validate_chunking(config, &mut errors);
        Self::validate_retrieval(config, &mut errors);

        if errors.is_empty() {
            Ok(())
        } else {
            Err(VaultdexError::ConfigValidation { errors })
        }
    }

    fn validate_schema_version(config: &Config, errors: &mut Vec<ValidationError>) {
        let version = &config.meta.schema_version;
        if version != "1.0.0" {
            errors.push(ValidationError::new(
                "_meta.schema_version",
                format!("Unsupported schema version: {}", version),
            ));
        }
    }

    fn validate_storage(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.storage.data_dir.as_os_str().is_empty() {
            errors.push(ValidationError::new(
                "storage.data_dir",
                "Data directory cannot be empty",
            ));
        }
    }

    fn validate_corpus(config: &Config, errors: &mut Vec<ValidationError>) {
        // Existence of the root is checked when the corpus is listed
        if config.corpus.root.as_os_str().is_empty() {
            errors.push(ValidationError::new(
                "corpus.root",
                "Corpus root cannot be empty",
            ));
        }

        if config.corpus.extensions.is_empty() {
            errors.push(ValidationError::new(
                "corpus.extensions",
                "At least one file extension is required",
            ));
        }

        for ext in &config.corpus.extensions {
            if ext.is_empty() || ext.starts_with('.') {
                errors.push(ValidationError::new(
                    "corpus.extensions",
                    format!("Extensions are written without a dot, got '{}'", ext),
                ));
            }
        }
    }

    fn validate_embedding(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.embedding.batch_size == 0 {
            errors.push(ValidationError::new(
                "embedding.batch_size",
                "Batch size must be greater than 0",
            ));
        }

        if config.embedding.dimension == 0 {
            errors.push(ValidationError::new(
                "embedding.dimension",
                "Embedding dimension must be greater than 0",
            ));
        }

        if config.embedding.model.is_empty() {
            errors.push(ValidationError::new(
                "embedding.model",
                "Model name cannot be empty",
            ));
        }
    }

    fn validate_chunking(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.chunking.max_chunk_size < 16 {
            errors.push(ValidationError::new(
                "chunking.max_chunk_size",
                format!(
                    "Chunk size must be at least 16 bytes, got {}",
                    config.chunking.max_chunk_size
                ),
            ));
        }
    }

    fn validate_retrieval(config: &Config, errors: &mut Vec<ValidationError>) {
        let retrieval = &config.retrieval;

        if !(0.0..=1.0).contains(&retrieval.min_similarity_score) {
            errors.push(ValidationError::new(
                "retrieval.min_similarity_score",
                format!(
                    "Score threshold must be between 0.0 and 1.0, got {}",
                    retrieval.min_similarity_score
                ),
            ));
        }

        if !(0.0..=1.0).contains(&retrieval.text_weight) {
            errors.push(ValidationError::new(
                "retrieval.text_weight",
                format!(
                    "Text weight must be between 0.0 and 1.0, got {}",
                    retrieval.text_weight
                ),
            ));
        }

        if retrieval.max_k == 0 {
            errors.push(ValidationError::new(
                "retrieval.max_k",
                "max_k must be greater than 0",
            ));
        }
    }
}
