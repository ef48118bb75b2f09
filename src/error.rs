use crate::embedding::EmbeddingError;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for vaultdex
#[derive(Error, Debug)]
pub enum VaultdexError {
    /// Configuration related errors (bad weights, dimension mismatch, incompatible index)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Configuration validation errors
    #[error("Configuration validation failed: {errors:?}")]
    ConfigValidation { errors: Vec<ValidationError> },

    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: PathBuf },

    /// Invalid configuration value
    #[error("Invalid configuration value at {path}: {message}")]
    InvalidConfigValue { path: String, message: String },

    /// Durable layer unavailable or corrupt
    #[error("Storage error: {0}")]
    Storage(String),

    /// Database errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Embedding provider failure
    #[error("Embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    /// The corpus could not be fully enumerated
    #[error("Corpus listing incomplete: {skipped} entries could not be read")]
    IncompleteListing { skipped: usize },

    /// A mutating operation was rejected because another one is in flight
    #[error("Index is busy: cannot {operation} while another index operation is running")]
    Busy { operation: &'static str },

    /// IO errors
    #[error("IO error: {context}: {source}")]
    Io {
        source: std::io::Error,
        context: String,
    },

    /// TOML deserialization errors
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// TOML serialization errors
    #[error("TOML serialization error: {0}")]
    TomlSerialization(#[from] toml::ser::Error),

    /// JSON errors
    #[error("JSON error: {context}: {source}")]
    Json {
        source: serde_json::Error,
        context: String,
    },

    /// Generic errors
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl VaultdexError {
    /// True for the fail-fast single-flight rejection
    pub fn is_busy(&self) -> bool {
        matches!(self, VaultdexError::Busy { .. })
    }
}

impl From<r2d2::Error> for VaultdexError {
    fn from(e: r2d2::Error) -> Self {
        VaultdexError::Storage(format!("Connection pool error: {}", e))
    }
}

/// Configuration validation error
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// Path to the configuration key that failed validation
    pub path: String,
    /// Error message describing the validation failure
    pub message: String,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Result type for vaultdex operations
pub type Result<T> = std::result::Result<T, VaultdexError>;
