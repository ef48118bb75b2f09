//! Splitting file content into indexable chunks
//!
//! The default chunker packs whole paragraphs (blank-line separated) into
//! chunks of at most `max_chunk_size` bytes, cutting oversized paragraphs on
//! whitespace. Offsets are byte positions in the original text, which keeps
//! chunk ids stable for unchanged content.

use crate::storage::{Metadata, MetadataValue};
use std::path::Path;

/// A chunk before embedding
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkDraft {
    pub offset: usize,
    pub content: String,
    pub metadata: Metadata,
}

/// Produces chunks for one file; must be deterministic for identical input
pub trait Chunker: Send + Sync {
    fn chunk(&self, path: &str, content: &str) -> Vec<ChunkDraft>;
}

/// Paragraph-packing chunker with markdown heading metadata
#[derive(Debug, Clone)]
pub struct TextChunker {
    max_chunk_size: usize,
}

impl TextChunker {
    pub fn new(max_chunk_size: usize) -> Self {
        Self {
            max_chunk_size: max_chunk_size.max(16),
        }
    }

    /// Paragraph spans as `(start, end)` byte ranges, trailing whitespace excluded
    fn paragraphs(content: &str) -> Vec<(usize, usize)> {
        let mut spans = Vec::new();
        let mut start: Option<usize> = None;
        let mut end = 0;
        let mut pos = 0;

        for line in content.split_inclusive('\n') {
            if line.trim().is_empty() {
                if let Some(s) = start.take() {
                    spans.push((s, end));
                }
            } else {
                if start.is_none() {
                    start = Some(pos);
                }
                end = pos + line.trim_end().len();
            }
            pos += line.len();
        }

        if let Some(s) = start {
            spans.push((s, end));
        }
        spans
    }

    /// Cut `[start, end)` into pieces no longer than the limit, preferring whitespace
    fn split_long(&self, content: &str, start: usize, end: usize, out: &mut Vec<(usize, usize)>) {
        let mut cursor = start;
        while end - cursor > self.max_chunk_size {
            let mut limit = cursor + self.max_chunk_size;
            while !content.is_char_boundary(limit) {
                limit -= 1;
            }

            let window = &content[cursor..limit];
            let cut = match window.rfind(char::is_whitespace) {
                Some(i) if i > 0 => cursor + i,
                _ => limit,
            };
            out.push((cursor, cut));

            cursor = cut;
            while cursor < end {
                match content[cursor..].chars().next() {
                    Some(c) if c.is_whitespace() => cursor += c.len_utf8(),
                    _ => break,
                }
            }
        }
        if cursor < end {
            out.push((cursor, end));
        }
    }

    fn headings(content: &str) -> Vec<(usize, String)> {
        let mut headings = Vec::new();
        let mut pos = 0;
        for line in content.split_inclusive('\n') {
            let trimmed = line.trim();
            if let Some(rest) = trimmed.strip_prefix('#') {
                let text = rest.trim_start_matches('#');
                if text.starts_with(' ') && !text.trim().is_empty() {
                    headings.push((pos, text.trim().to_string()));
                }
            }
            pos += line.len();
        }
        headings
    }
}

impl Default for TextChunker {
    fn default() -> Self {
        Self::new(2000)
    }
}

impl Chunker for TextChunker {
    fn chunk(&self, path: &str, content: &str) -> Vec<ChunkDraft> {
        if content.trim().is_empty() {
            return Vec::new();
        }

        let mut spans: Vec<(usize, usize)> = Vec::new();
        let mut current: Option<(usize, usize)> = None;

        for (p_start, p_end) in Self::paragraphs(content) {
            if p_end - p_start > self.max_chunk_size {
                if let Some(span) = current.take() {
                    spans.push(span);
                }
                self.split_long(content, p_start, p_end, &mut spans);
                continue;
            }

            current = match current {
                Some((c_start, _)) if p_end - c_start <= self.max_chunk_size => {
                    Some((c_start, p_end))
                }
                Some(span) => {
                    spans.push(span);
                    Some((p_start, p_end))
                }
                None => Some((p_start, p_end)),
            };
        }
        if let Some(span) = current {
            spans.push(span);
        }

        let title = Path::new(path)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string());
        let headings = Self::headings(content);
        let count = spans.len();

        spans
            .into_iter()
            .enumerate()
            .map(|(index, (start, end))| {
                let mut metadata = Metadata::new();
                metadata.insert("title".to_string(), MetadataValue::from(title.as_str()));
                metadata.insert("chunk_index".to_string(), index.into());
                metadata.insert("chunk_count".to_string(), count.into());
                if let Some((_, heading)) = headings.iter().rev().find(|(pos, _)| *pos <= start) {
                    metadata.insert("heading".to_string(), heading.as_str().into());
                }

                ChunkDraft {
                    offset: start,
                    content: content[start..end].to_string(),
                    metadata,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_and_whitespace_content() {
        let chunker = TextChunker::default();
        assert!(chunker.chunk("a.md", "").is_empty());
        assert!(chunker.chunk("a.md", "  \n\t\n ").is_empty());
    }

    #[test]
    fn test_small_file_is_one_chunk() {
        let chunker = TextChunker::default();
        let chunks = chunker.chunk("notes/A.md", "apples are red\n\nand sweet\n");

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].offset, 0);
        assert_eq!(chunks[0].content, "apples are red\n\nand sweet");
        assert_eq!(
            chunks[0].metadata.get("title"),
            Some(&MetadataValue::Text("A".to_string()))
        );
        assert_eq!(
            chunks[0].metadata.get("chunk_count"),
            Some(&MetadataValue::Number(1.0))
        );
    }

    #[test]
    fn test_paragraphs_packed_up_to_limit() {
        let chunker = TextChunker::new(20);
        let content = "first paragraph\n\nsecond one\n\nthird";
        let chunks = chunker.chunk("a.md", content);

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].content, "first paragraph");
        assert_eq!(chunks[1].content, "second one\n\nthird");
        assert_eq!(&content[chunks[1].offset..chunks[1].offset + 10], "second one");
    }

    #[test]
    fn test_long_paragraph_split_on_whitespace() {
        let chunker = TextChunker::new(16);
        let content = "alpha beta gamma delta epsilon zeta";
        let chunks = chunker.chunk("a.md", content);

        assert!(chunks.len() >= 3);
        for chunk in &chunks {
            assert!(chunk.content.len() <= 16);
            assert!(!chunk.content.starts_with(' '));
            assert_eq!(&content[chunk.offset..chunk.offset + chunk.content.len()], chunk.content);
        }
    }

    #[test]
    fn test_multibyte_text_respects_char_boundaries() {
        let chunker = TextChunker::new(16);
        let content = "ééééééééééééééééééééé";
        let chunks = chunker.chunk("a.md", content);
        let joined: String = chunks.iter().map(|c| c.content.as_str()).collect();
        assert_eq!(joined, content);
    }

    #[test]
    fn test_heading_metadata() {
        let chunker = TextChunker::new(20);
        let content = "# Fruit\n\napples are red\n\n## Veg\n\ncarrots";
        let chunks = chunker.chunk("a.md", content);

        let last = chunks.last().unwrap();
        assert_eq!(
            last.metadata.get("heading"),
            Some(&MetadataValue::Text("Veg".to_string()))
        );
    }

    #[test]
    fn test_deterministic() {
        let chunker = TextChunker::new(32);
        let content = "one two three four five six seven\n\neight nine ten";
        assert_eq!(chunker.chunk("a.md", content), chunker.chunk("a.md", content));
    }
}
