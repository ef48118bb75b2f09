//! SQLite database management with migrations
//!
//! Durable layer behind the document store: chunk rows plus the index
//! metadata that pins embedding dimension, model and score normalization.

use super::chunk::{DocumentChunk, Metadata};
use crate::error::{Result, VaultdexError};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, OptionalExtension};
use std::path::Path;
use std::sync::Arc;

/// Database connection pool
pub type DbPool = Pool<SqliteConnectionManager>;

/// Settings that must match between the persisted index and the running config
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexMeta {
    pub embedding_dimension: usize,
    pub embedding_model: String,
    pub score_normalization: String,
}

/// One `save()` worth of changes, written in a single transaction
#[derive(Debug, Default)]
pub struct SaveBatch {
    /// Wipe every row before applying `replace`
    pub clear_all: bool,
    /// Paths whose rows are replaced; an empty chunk list deletes the path
    pub replace: Vec<(String, Arc<Vec<DocumentChunk>>)>,
}

impl SaveBatch {
    pub fn is_empty(&self) -> bool {
        !self.clear_all && self.replace.is_empty()
    }
}

/// Database manager with migration support
pub struct Database {
    pool: DbPool,
}

impl Database {
    /// Open (or create) the database file
    pub fn new(db_path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| VaultdexError::Io {
                source: e,
                context: format!("Failed to create database directory: {:?}", parent),
            })?;
        }

        // Create connection pool
        let manager = SqliteConnectionManager::file(db_path);

        let pool = Pool::builder()
            .max_size(8)
            .build(manager)
            .map_err(|e| VaultdexError::Storage(format!("Failed to create connection pool: {}", e)))?;

        // Enable WAL mode for better concurrency
        {
            let conn = pool.get()?;
            conn.execute_batch(
                "
                PRAGMA journal_mode = WAL;
                PRAGMA synchronous = NORMAL;
                PRAGMA busy_timeout = 5000;
                ",
            )?;
        }

        let db = Self { pool };

        // Run migrations
        db.migrate()?;

        Ok(db)
    }

    /// Get a connection from the pool
    pub fn get_conn(&self) -> Result<r2d2::PooledConnection<SqliteConnectionManager>> {
        Ok(self.pool.get()?)
    }

    /// Run database migrations
    fn migrate(&self) -> Result<()> {
        let conn = self.get_conn()?;

        // Create migrations table if it doesn't exist
        conn.execute(
            "CREATE TABLE IF NOT EXISTS _migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            )",
            [],
        )?;

        // Get current version
        let current_version: i32 = conn.query_row(
            "SELECT COALESCE(MAX(version), 0) FROM _migrations",
            [],
            |row| row.get(0),
        )?;

        for (version, migration) in MIGRATIONS.iter().enumerate() {
            let version = version as i32 + 1;

            if version > current_version {
                tracing::info!("Applying migration {}", version);

                conn.execute_batch(migration)?;

                conn.execute(
                    "INSERT INTO _migrations (version, applied_at) VALUES (?1, datetime('now'))",
                    params![version],
                )?;
            }
        }

        Ok(())
    }

    /// Read the recorded index settings, if any save has happened yet
    pub fn read_meta(&self) -> Result<Option<IndexMeta>> {
        let conn = self.get_conn()?;
        let get = |key: &str| -> Result<Option<String>> {
            Ok(conn
                .query_row(
                    "SELECT value FROM index_meta WHERE key = ?1",
                    params![key],
                    |row| row.get(0),
                )
                .optional()?)
        };

        let dimension = match get("embedding_dimension")? {
            Some(value) => value.parse::<usize>().map_err(|_| {
                VaultdexError::Storage(format!("Corrupt embedding_dimension: {}", value))
            })?,
            None => return Ok(None),
        };

        Ok(Some(IndexMeta {
            embedding_dimension: dimension,
            embedding_model: get("embedding_model")?.unwrap_or_default(),
            score_normalization: get("score_normalization")?.unwrap_or_default(),
        }))
    }

    /// Load every chunk, grouped by path in offset order
    pub fn load_chunks(&self) -> Result<Vec<DocumentChunk>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, path, offset_bytes, content, embedding, content_hash, source_hash, mtime, metadata
             FROM chunks ORDER BY path, offset_bytes",
        )?;

        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, Vec<u8>>(4)?,
                row.get::<_, String>(5)?,
                row.get::<_, String>(6)?,
                row.get::<_, i64>(7)?,
                row.get::<_, Option<String>>(8)?,
            ))
        })?;

        let mut chunks = Vec::new();
        for row in rows {
            let (id, path, offset, content, embedding, content_hash, source_hash, mtime, metadata) =
                row?;

            let metadata: Metadata = match metadata {
                Some(json) => serde_json::from_str(&json).map_err(|e| VaultdexError::Json {
                    source: e,
                    context: format!("Corrupt metadata for chunk {}", id),
                })?,
                None => Metadata::new(),
            };

            chunks.push(DocumentChunk {
                embedding: decode_embedding(&embedding).ok_or_else(|| {
                    VaultdexError::Storage(format!("Corrupt embedding for chunk {}", id))
                })?,
                id,
                path,
                offset: offset as usize,
                content,
                content_hash,
                source_hash,
                mtime,
                metadata,
            });
        }

        Ok(chunks)
    }

    /// Apply a batch of replacements and record index settings, atomically
    pub fn write_batch(&self, batch: &SaveBatch, meta: &IndexMeta) -> Result<()> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        if batch.clear_all {
            tx.execute("DELETE FROM chunks", [])?;
        }

        {
            let mut delete = tx.prepare("DELETE FROM chunks WHERE path = ?1")?;
            let mut insert = tx.prepare(
                "INSERT INTO chunks
                 (id, path, offset_bytes, content, embedding, content_hash, source_hash, mtime, metadata)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            )?;

            for (path, chunks) in &batch.replace {
                // Replace the whole chunk set of the path
                delete.execute(params![path])?;

                for chunk in chunks.iter() {
                    let metadata = serde_json::to_string(&chunk.metadata).map_err(|e| {
                        VaultdexError::Json {
                            source: e,
                            context: format!("Failed to serialize metadata for {}", chunk.path),
                        }
                    })?;

                    insert.execute(params![
                        chunk.id,
                        chunk.path,
                        chunk.offset as i64,
                        chunk.content,
                        encode_embedding(&chunk.embedding),
                        chunk.content_hash,
                        chunk.source_hash,
                        chunk.mtime,
                        metadata,
                    ])?;
                }
            }

            // Record the settings this index was built with
            let mut upsert_meta = tx.prepare(
                "INSERT INTO index_meta (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            )?;
            upsert_meta.execute(params![
                "embedding_dimension",
                meta.embedding_dimension.to_string()
            ])?;
            upsert_meta.execute(params!["embedding_model", meta.embedding_model])?;
            upsert_meta.execute(params!["score_normalization", meta.score_normalization])?;
        }

        tx.commit()?;
        Ok(())
    }

    /// Get database statistics
    pub fn stats(&self) -> Result<DbStats> {
        let conn = self.get_conn()?;

        let document_count: i64 =
            conn.query_row("SELECT COUNT(DISTINCT path) FROM chunks", [], |row| {
                row.get(0)
            })?;

        let chunk_count: i64 =
            conn.query_row("SELECT COUNT(*) FROM chunks", [], |row| row.get(0))?;

        let embedded_count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM chunks WHERE length(embedding) > 0",
            [],
            |row| row.get(0),
        )?;

        Ok(DbStats {
            document_count: document_count as usize,
            chunk_count: chunk_count as usize,
            embedded_chunk_count: embedded_count as usize,
        })
    }
}

/// Database statistics (durable state only)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbStats {
    pub document_count: usize,
    pub chunk_count: usize,
    pub embedded_chunk_count: usize,
}

fn encode_embedding(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|v| v.to_le_bytes()).collect()
}

fn decode_embedding(bytes: &[u8]) -> Option<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return None;
    }
    Some(
        bytes
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect(),
    )
}

/// Database migrations (each string is one migration)
const MIGRATIONS: &[&str] = &[
    // Migration 1: Initial schema
    r#"
    CREATE TABLE chunks (
        id TEXT PRIMARY KEY,
        path TEXT NOT NULL,
        offset_bytes INTEGER NOT NULL,
        content TEXT NOT NULL,
        embedding BLOB NOT NULL,
        content_hash TEXT NOT NULL,
        source_hash TEXT NOT NULL,
        mtime INTEGER NOT NULL,
        metadata TEXT
    );

    CREATE INDEX idx_chunks_path ON chunks(path);

    CREATE TABLE index_meta (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL
    );
    "#,
];
