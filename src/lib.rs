//! Vaultdex - incremental semantic index over a folder of notes
//!
//! Keeps a persistent chunk and embedding index in step with files that
//! change outside its control, re-embedding only what changed, and ranks
//! chunks by a blend of vector similarity and salient-term matches.

pub mod chunking;
pub mod cli;
pub mod config;
pub mod corpus;
pub mod embedding;
pub mod error;
pub mod manager;
pub mod retrieval;
pub mod storage;
pub mod sync;

pub use error::{Result, VaultdexError};
pub use manager::VectorStoreManager;
pub use retrieval::{RetrievalConfig, ScoredChunk};
