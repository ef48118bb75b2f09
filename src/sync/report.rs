//! Results of index runs and the files status listing

use serde::Serialize;
use std::fmt::Write as _;

/// A file that could not be (re-)indexed during a run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileFailure {
    pub path: String,
    pub reason: String,
}

/// Outcome of one `index_to_store` run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IndexReport {
    /// Files chunked, embedded and stored
    pub processed: usize,
    /// Files left untouched because they were already indexed
    pub skipped: usize,
    /// Previously indexed files dropped because their content is now empty
    pub removed_empty: usize,
    /// Files that could not be read or embedded this run
    pub failed: usize,
    /// The run stopped early on request
    pub cancelled: bool,
    pub failures: Vec<FileFailure>,
}

impl IndexReport {
    pub(crate) fn record_failure(&mut self, path: &str, reason: impl Into<String>) {
        self.failed += 1;
        self.failures.push(FileFailure {
            path: path.to_string(),
            reason: reason.into(),
        });
    }
}

/// Progress notifications emitted by the index manager
#[derive(Debug, Clone, PartialEq)]
pub enum IndexEvent {
    IndexStarted { force: bool, files: usize },
    FileIndexed { path: String, chunks: usize },
    FileFailed { path: String, reason: String },
    IndexFinished(IndexReport),
    GarbageCollected { removed: usize },
    DocsRemoved { removed: usize },
    IndexCleared,
}

/// Classification of every corpus file for inspection
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FilesStatus {
    /// Paths with at least one stored chunk
    pub indexed: Vec<String>,
    /// Indexed corpus files none of whose chunks has an embedding
    pub missing_embeddings: Vec<String>,
    /// Non-empty corpus files absent from the store
    pub unindexed: Vec<String>,
    /// Corpus files with empty or whitespace-only content
    pub empty: Vec<String>,
    /// Corpus files that could not be read
    pub unreadable: Vec<String>,
}

impl FilesStatus {
    pub fn is_empty(&self) -> bool {
        self.indexed.is_empty()
            && self.unindexed.is_empty()
            && self.empty.is_empty()
            && self.unreadable.is_empty()
    }

    /// Markdown summary: counts first, then one section per class
    pub fn to_markdown(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "# Index Files Status");
        let _ = writeln!(out, "- Indexed files: {}", self.indexed.len());
        let _ = writeln!(
            out,
            "\t- Files missing embeddings: {}",
            self.missing_embeddings.len()
        );
        let _ = writeln!(out, "- Unindexed files: {}", self.unindexed.len());
        let _ = writeln!(out, "- Empty files: {}", self.empty.len());
        if !self.unreadable.is_empty() {
            let _ = writeln!(out, "- Unreadable files: {}", self.unreadable.len());
        }

        let _ = writeln!(out, "\n## Indexed Files");
        for path in &self.indexed {
            let missing = self.missing_embeddings.contains(path);
            let _ = writeln!(
                out,
                "- [[{}]]{}",
                path,
                if missing { " *(embedding missing)*" } else { "" }
            );
        }

        section(&mut out, "Unindexed Files", &self.unindexed, "No unindexed files found.");
        section(&mut out, "Empty Files", &self.empty, "No empty files found.");
        if !self.unreadable.is_empty() {
            section(&mut out, "Unreadable Files", &self.unreadable, "");
        }
        out
    }
}

fn section(out: &mut String, title: &str, paths: &[String], none: &str) {
    let _ = writeln!(out, "\n## {}", title);
    if paths.is_empty() {
        let _ = writeln!(out, "{}", none);
    }
    for path in paths {
        let _ = writeln!(out, "- [[{}]]", path);
    }
}
