//! Character-count text splitting
//!
//! Two modes share one configuration:
//! - window mode (no separator): fixed windows of `chunk_size` characters whose
//!   starts advance by `chunk_size - chunk_overlap`
//! - separator mode: split on a literal or regex separator, then merge pieces
//!   greedily up to `chunk_size`, carrying up to `chunk_overlap` characters of
//!   trailing pieces into the next chunk
//!
//! All sizes and offsets are in characters, not bytes.

use crate::config::SplitterConfig;
use crate::document::Document;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SplitterError {
    #[error("Chunk size must be greater than 0")]
    ZeroChunkSize,

    #[error("Chunk overlap ({overlap}) must be smaller than chunk size ({size})")]
    OverlapTooLarge { overlap: usize, size: usize },

    #[error("Invalid separator pattern: {0}")]
    InvalidSeparator(String),
}

/// Per-chunk metadata persisted alongside the chunk text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    /// Source identifier of the parent document
    pub source: String,
    /// Position of the chunk in the document's chunk sequence
    pub chunk_index: usize,
    /// Character offset of the first character
    pub start_offset: usize,
    /// Character offset one past the last character
    pub end_offset: usize,
}

/// A contiguous piece of a document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub text: String,
    pub metadata: ChunkMetadata,
}

impl Chunk {
    pub fn char_len(&self) -> usize {
        self.metadata.end_offset - self.metadata.start_offset
    }
}

/// Byte range into the source text
#[derive(Debug, Clone, Copy)]
struct Span {
    start: usize,
    end: usize,
}

/// Splits documents into overlapping chunks
#[derive(Debug, Clone)]
pub struct CharacterSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
    separator: Option<Regex>,
    strip_whitespace: bool,
}

impl CharacterSplitter {
    /// Boundary-naive splitter cutting fixed character windows
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self, SplitterError> {
        Self::validate(chunk_size, chunk_overlap)?;
        Ok(Self {
            chunk_size,
            chunk_overlap,
            separator: None,
            strip_whitespace: false,
        })
    }

    /// Separator-aware splitter. `separator` is escaped unless `is_regex`.
    pub fn with_separator(
        chunk_size: usize,
        chunk_overlap: usize,
        separator: &str,
        is_regex: bool,
        strip_whitespace: bool,
    ) -> Result<Self, SplitterError> {
        Self::validate(chunk_size, chunk_overlap)?;

        if separator.is_empty() {
            return Err(SplitterError::InvalidSeparator(
                "separator cannot be empty".to_string(),
            ));
        }

        let pattern = if is_regex {
            separator.to_string()
        } else {
            regex::escape(separator)
        };
        let separator =
            Regex::new(&pattern).map_err(|e| SplitterError::InvalidSeparator(e.to_string()))?;

        Ok(Self {
            chunk_size,
            chunk_overlap,
            separator: Some(separator),
            strip_whitespace,
        })
    }

    pub fn from_config(config: &SplitterConfig) -> Result<Self, SplitterError> {
        match &config.separator {
            Some(separator) => Self::with_separator(
                config.chunk_size,
                config.chunk_overlap,
                separator,
                config.separator_is_regex,
                config.strip_whitespace,
            ),
            None => Self::new(config.chunk_size, config.chunk_overlap),
        }
    }

    fn validate(chunk_size: usize, chunk_overlap: usize) -> Result<(), SplitterError> {
        if chunk_size == 0 {
            return Err(SplitterError::ZeroChunkSize);
        }
        if chunk_overlap >= chunk_size {
            return Err(SplitterError::OverlapTooLarge {
                overlap: chunk_overlap,
                size: chunk_size,
            });
        }
        Ok(())
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    /// Split a document into ordered chunks
    pub fn split(&self, document: &Document) -> Vec<Chunk> {
        let text = document.content.as_str();
        let index = CharIndex::new(text);

        let spans = match &self.separator {
            Some(separator) => self.merge_pieces(text, &index, separator),
            None => self.windows(&index),
        };

        let chunks: Vec<Chunk> = spans
            .into_iter()
            .enumerate()
            .map(|(chunk_index, span)| Chunk {
                text: text[span.start..span.end].to_string(),
                metadata: ChunkMetadata {
                    source: document.metadata.source.clone(),
                    chunk_index,
                    start_offset: index.char_at(span.start),
                    end_offset: index.char_at(span.end),
                },
            })
            .collect();

        tracing::debug!(
            "Split {} into {} chunks (size {}, overlap {})",
            document.metadata.source,
            chunks.len(),
            self.chunk_size,
            self.chunk_overlap
        );

        chunks
    }

    fn windows(&self, index: &CharIndex) -> Vec<Span> {
        let total = index.char_count();
        let stride = self.chunk_size - self.chunk_overlap;
        let mut spans = Vec::new();

        let mut start = 0;
        while start < total {
            let end = (start + self.chunk_size).min(total);
            spans.push(Span {
                start: index.byte_at(start),
                end: index.byte_at(end),
            });
            if end == total {
                break;
            }
            start += stride;
        }

        spans
    }

    fn merge_pieces(&self, text: &str, index: &CharIndex, separator: &Regex) -> Vec<Span> {
        let mut pieces = Vec::new();
        let mut cursor = 0;
        for m in separator.find_iter(text) {
            if m.start() > cursor {
                pieces.push(Span {
                    start: cursor,
                    end: m.start(),
                });
            }
            cursor = m.end();
        }
        if cursor < text.len() {
            pieces.push(Span {
                start: cursor,
                end: text.len(),
            });
        }

        let width = |a: usize, b: usize| index.char_at(b) - index.char_at(a);

        let mut spans = Vec::new();
        let mut current: VecDeque<Span> = VecDeque::new();

        for piece in pieces {
            let merged_len = |current: &VecDeque<Span>| match current.front() {
                Some(first) => width(first.start, piece.end),
                None => width(piece.start, piece.end),
            };

            if merged_len(&current) > self.chunk_size {
                if let Some(span) = Self::covering(&current) {
                    self.emit(text, index, span, &mut spans);
                }
                while let Some(held) = Self::covering(&current).map(|s| width(s.start, s.end)) {
                    if held > self.chunk_overlap || merged_len(&current) > self.chunk_size {
                        current.pop_front();
                    } else {
                        break;
                    }
                }
            }

            current.push_back(piece);
        }

        if let Some(span) = Self::covering(&current) {
            self.emit(text, index, span, &mut spans);
        }

        spans
    }

    fn covering(current: &VecDeque<Span>) -> Option<Span> {
        match (current.front(), current.back()) {
            (Some(first), Some(last)) => Some(Span {
                start: first.start,
                end: last.end,
            }),
            _ => None,
        }
    }

    fn emit(&self, text: &str, index: &CharIndex, span: Span, spans: &mut Vec<Span>) {
        let span = if self.strip_whitespace {
            let slice = &text[span.start..span.end];
            let leading = slice.len() - slice.trim_start().len();
            let trailing = slice.len() - slice.trim_end().len();
            if leading + trailing >= slice.len() {
                return;
            }
            Span {
                start: span.start + leading,
                end: span.end - trailing,
            }
        } else {
            span
        };

        if span.start == span.end {
            return;
        }

        let len = index.char_at(span.end) - index.char_at(span.start);
        if len > self.chunk_size {
            tracing::warn!(
                "Created a chunk of size {}, which is longer than the specified {}",
                len,
                self.chunk_size
            );
        }

        spans.push(span);
    }
}

/// Maps between character positions and byte offsets
struct CharIndex {
    /// Byte offset of every character, plus the text length as a sentinel
    bounds: Vec<usize>,
}

impl CharIndex {
    fn new(text: &str) -> Self {
        let mut bounds: Vec<usize> = text.char_indices().map(|(i, _)| i).collect();
        bounds.push(text.len());
        Self { bounds }
    }

    fn char_count(&self) -> usize {
        self.bounds.len() - 1
    }

    fn byte_at(&self, char_pos: usize) -> usize {
        self.bounds[char_pos]
    }

    /// Character position of a byte offset lying on a char boundary
    fn char_at(&self, byte: usize) -> usize {
        self.bounds.binary_search(&byte).unwrap_or_else(|pos| pos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(text: &str) -> Document {
        Document::new(text, "test.txt")
    }

    #[test]
    fn test_rejects_overlap_not_smaller_than_size() {
        assert!(matches!(
            CharacterSplitter::new(100, 100),
            Err(SplitterError::OverlapTooLarge { .. })
        ));
        assert!(matches!(
            CharacterSplitter::new(0, 0),
            Err(SplitterError::ZeroChunkSize)
        ));
    }

    #[test]
    fn test_window_starts_advance_by_stride() {
        let text: String = (0..5000).map(|i| (b'a' + (i % 26) as u8) as char).collect();
        let splitter = CharacterSplitter::new(1000, 50).unwrap();
        let chunks = splitter.split(&doc(&text));

        assert_eq!(chunks.len(), 6);
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.metadata.start_offset, i * 950);
            assert_eq!(chunk.metadata.chunk_index, i);
        }
        for chunk in &chunks[..5] {
            assert_eq!(chunk.char_len(), 1000);
        }
        assert_eq!(chunks[5].char_len(), 250);
        assert_eq!(chunks.last().unwrap().metadata.end_offset, 5000);
    }

    #[test]
    fn test_window_covers_every_character() {
        let text = "Gandalf arrives at Bag End on Bilbo's birthday. ".repeat(90);
        let splitter = CharacterSplitter::new(1000, 50).unwrap();
        let chunks = splitter.split(&doc(&text));

        let total = text.chars().count();
        let mut covered = vec![false; total];
        for chunk in &chunks {
            for slot in &mut covered[chunk.metadata.start_offset..chunk.metadata.end_offset] {
                *slot = true;
            }
        }
        assert!(covered.iter().all(|c| *c));

        for pair in chunks.windows(2) {
            assert_eq!(pair[0].metadata.end_offset - pair[1].metadata.start_offset, 50);
            let tail: String = pair[0].text.chars().skip(950).collect();
            let head: String = pair[1].text.chars().take(50).collect();
            assert_eq!(tail, head);
        }
    }

    #[test]
    fn test_window_short_and_empty_documents() {
        let splitter = CharacterSplitter::new(1000, 50).unwrap();
        assert!(splitter.split(&doc("")).is_empty());

        let chunks = splitter.split(&doc("Short tale."));
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "Short tale.");
    }

    #[test]
    fn test_window_exact_size_yields_one_chunk() {
        let text = "x".repeat(1000);
        let chunks = CharacterSplitter::new(1000, 50).unwrap().split(&doc(&text));
        assert_eq!(chunks.len(), 1);
    }

    #[test]
    fn test_window_respects_multibyte_characters() {
        let text = "ñ".repeat(25);
        let chunks = CharacterSplitter::new(10, 2).unwrap().split(&doc(&text));

        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].text.chars().count(), 10);
        assert_eq!(chunks[2].metadata.start_offset, 16);
        assert_eq!(chunks[2].text.chars().count(), 9);
    }

    #[test]
    fn test_split_is_deterministic() {
        let text = "One ring to rule them all. ".repeat(100);
        let splitter = CharacterSplitter::new(300, 30).unwrap();
        assert_eq!(splitter.split(&doc(&text)), splitter.split(&doc(&text)));
    }

    #[test]
    fn test_separator_merges_paragraphs() {
        let text = "aaaa\n\nbbbb\n\ncccc\n\ndddd";
        let splitter = CharacterSplitter::with_separator(10, 0, "\n\n", false, true).unwrap();
        let chunks = splitter.split(&doc(text));

        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["aaaa\n\nbbbb", "cccc\n\ndddd"]);
        assert_eq!(chunks[1].metadata.start_offset, 12);
        assert_eq!(chunks[1].metadata.end_offset, 22);
    }

    #[test]
    fn test_separator_carries_overlap() {
        let text = "aaaa bbbb cccc dddd";
        let splitter = CharacterSplitter::with_separator(9, 4, " ", false, true).unwrap();
        let chunks = splitter.split(&doc(text));

        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["aaaa bbbb", "bbbb cccc", "cccc dddd"]);
    }

    #[test]
    fn test_separator_keeps_oversized_piece() {
        let text = "short\n\nthis paragraph is far too long\n\nend";
        let splitter = CharacterSplitter::with_separator(10, 0, "\n\n", false, true).unwrap();
        let chunks = splitter.split(&doc(text));

        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["short", "this paragraph is far too long", "end"]);
    }

    #[test]
    fn test_separator_regex_and_stripping() {
        let text = "  alpha  \n\n\n  beta  ";
        let splitter = CharacterSplitter::with_separator(8, 0, r"\n{2,}", true, true).unwrap();
        let chunks = splitter.split(&doc(text));

        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["alpha", "beta"]);
        assert_eq!(chunks[0].metadata.start_offset, 2);
    }

    #[test]
    fn test_invalid_regex_separator() {
        assert!(matches!(
            CharacterSplitter::with_separator(10, 0, "(", true, true),
            Err(SplitterError::InvalidSeparator(_))
        ));
    }
}
