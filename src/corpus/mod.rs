//! Access to the live document collection
//!
//! The index never owns the files; it only lists them and reads them.

use crate::error::{Result, VaultdexError};
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;
use walkdir::WalkDir;

/// A file as currently seen in the collection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorpusFile {
    /// Path relative to the corpus root, `/`-separated
    pub path: String,
    /// Last modification time, ms since epoch
    pub mtime: i64,
}

/// Result of enumerating the corpus
///
/// `skipped` holds entries that could not be read during the walk. Files
/// beneath them are absent from `files`, so an incomplete listing must not
/// be treated as the whole corpus.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CorpusListing {
    pub files: Vec<CorpusFile>,
    pub skipped: Vec<String>,
}

impl CorpusListing {
    pub fn is_complete(&self) -> bool {
        self.skipped.is_empty()
    }
}

/// Live corpus accessor
pub trait Corpus: Send + Sync {
    /// Every indexable file, in enumeration order
    fn list_files(&self) -> Result<CorpusListing>;

    /// Current text of `path`
    fn read_content(&self, path: &str) -> Result<String>;
}

/// Files under a directory, filtered by extension
pub struct FsCorpus {
    root: PathBuf,
    extensions: Vec<String>,
    exclude: Vec<String>,
}

impl FsCorpus {
    pub fn new(root: PathBuf, extensions: Vec<String>, exclude: Vec<String>) -> Self {
        Self {
            root,
            extensions: extensions
                .into_iter()
                .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
                .collect(),
            exclude,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn wanted(&self, path: &Path) -> bool {
        if self.extensions.is_empty() {
            return true;
        }
        path.extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
            .is_some_and(|e| self.extensions.iter().any(|x| *x == e))
    }

    fn relative(&self, path: &Path) -> Option<String> {
        let rel = path.strip_prefix(&self.root).ok()?;
        let parts: Vec<String> = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        Some(parts.join("/"))
    }
}

impl Corpus for FsCorpus {
    fn list_files(&self) -> Result<CorpusListing> {
        if !self.root.is_dir() {
            return Err(VaultdexError::Io {
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "not a directory"),
                context: format!("Corpus root unavailable: {}", self.root.display()),
            });
        }

        let mut listing = CorpusListing::default();
        let walker = WalkDir::new(&self.root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| {
                entry.depth() == 0
                    || !entry
                        .file_name()
                        .to_str()
                        .is_some_and(|name| self.exclude.iter().any(|x| x == name))
            });

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!("Skipping unreadable corpus entry: {}", e);
                    listing.skipped.push(e.to_string());
                    continue;
                }
            };
            if !entry.file_type().is_file() || !self.wanted(entry.path()) {
                continue;
            }

            let Some(path) = self.relative(entry.path()) else {
                continue;
            };

            let mtime = entry
                .metadata()
                .ok()
                .and_then(|m| m.modified().ok())
                .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
                .map(|d| d.as_millis() as i64)
                .unwrap_or(0);

            listing.files.push(CorpusFile { path, mtime });
        }

        Ok(listing)
    }

    fn read_content(&self, path: &str) -> Result<String> {
        let full = self.root.join(path);
        std::fs::read_to_string(&full).map_err(|e| VaultdexError::Io {
            source: e,
            context: format!("Failed to read {}", full.display()),
        })
    }
}
