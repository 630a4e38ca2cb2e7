//! Overlapping window chunker.
//!
//! Splits a document's extracted text into windows of at most `chunk_size`
//! characters. Consecutive windows share `chunk_overlap` characters so a
//! sentence cut at a boundary still appears whole in one of them.
//!
//! # Algorithm
//!
//! 1. Take the next `chunk_size` characters starting at `start`.
//! 2. Pick the window end, preferring in order: the last paragraph break
//!    (`\n\n`), the last sentence end (`. `, `? `, `! `, or a line break),
//!    the last whitespace, and finally a hard cut at `chunk_size`. A break
//!    is only taken if it leaves more than `chunk_overlap` characters in the
//!    window, so every step makes progress.
//! 3. Start the next window `chunk_overlap` characters before the end,
//!    moved forward to the start of a word when one is available.
//!
//! Windows are slices of the input: no character is dropped or rewritten,
//! and each character lands in at least one window. Whitespace-only windows
//! are discarded.
//!
//! Each chunk gets a random UUID and a SHA-256 hash of its text.

use sha2::{Digest, Sha256};
use std::ops::Range;
use uuid::Uuid;

use crate::config::ChunkingConfig;
use crate::models::{DocumentChunk, MetadataRecord};

const SENTENCE_ENDS: [&str; 4] = [". ", "? ", "! ", "\n"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl Chunker {
    /// `chunk_size` is raised to at least 1; `chunk_overlap` is capped below it.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            chunk_size,
            chunk_overlap: chunk_overlap.min(chunk_size - 1),
        }
    }

    pub fn from_config(config: &ChunkingConfig) -> Self {
        Self::new(config.chunk_size, config.chunk_overlap)
    }

    /// Window text slices, in document order.
    pub fn split<'t>(&self, text: &'t str) -> Vec<&'t str> {
        self.split_spans(text)
            .into_iter()
            .map(|span| &text[span])
            .collect()
    }

    /// Byte ranges of each window within `text`.
    pub fn split_spans(&self, text: &str) -> Vec<Range<usize>> {
        // bounds[i] is the byte offset of char i; the last entry is text.len().
        let bounds: Vec<usize> = text
            .char_indices()
            .map(|(i, _)| i)
            .chain(std::iter::once(text.len()))
            .collect();
        let char_count = bounds.len() - 1;

        let mut spans = Vec::new();
        let mut start = 0;
        while start < char_count {
            let limit = (start + self.chunk_size).min(char_count);
            let end = if limit == char_count {
                char_count
            } else {
                self.find_break(text, &bounds, start, limit)
            };

            let span = bounds[start]..bounds[end];
            if !text[span.clone()].trim().is_empty() {
                spans.push(span);
            }
            if end == char_count {
                break;
            }
            start = self.next_start(text, &bounds, start, end);
        }
        spans
    }

    /// Char index where the window starting at `start` should end.
    fn find_break(&self, text: &str, bounds: &[usize], start: usize, limit: usize) -> usize {
        let base = bounds[start];
        let window = &text[base..bounds[limit]];
        let min_end = bounds[start + self.chunk_overlap + 1];

        let accept = |end: usize| -> Option<usize> {
            let absolute = base + end;
            (absolute >= min_end).then(|| char_index(bounds, absolute))
        };

        let paragraph = window.rfind("\n\n").map(|pos| pos + 2);
        if let Some(end) = paragraph.and_then(accept) {
            return end;
        }

        let sentence = SENTENCE_ENDS
            .iter()
            .filter_map(|sep| window.rfind(sep).map(|pos| pos + sep.len()))
            .max();
        if let Some(end) = sentence.and_then(accept) {
            return end;
        }

        let word = window
            .char_indices()
            .rev()
            .find(|(_, c)| c.is_whitespace())
            .map(|(pos, c)| pos + c.len_utf8());
        if let Some(end) = word.and_then(accept) {
            return end;
        }

        limit
    }

    /// Char index of the next window start: `end - chunk_overlap`, nudged to a word start.
    fn next_start(&self, text: &str, bounds: &[usize], start: usize, end: usize) -> usize {
        let candidate = end.saturating_sub(self.chunk_overlap).max(start + 1);
        if candidate >= end || self.chunk_overlap == 0 {
            return candidate;
        }

        let at_word_start = text[..bounds[candidate]]
            .chars()
            .next_back()
            .map_or(true, char::is_whitespace);
        if at_word_start {
            return candidate;
        }

        let tail = &text[bounds[candidate]..bounds[end]];
        match tail.char_indices().find(|(_, c)| c.is_whitespace()) {
            Some((pos, c)) => {
                let next = char_index(bounds, bounds[candidate] + pos + c.len_utf8());
                if next < end {
                    next
                } else {
                    candidate
                }
            }
            None => candidate,
        }
    }
}

fn char_index(bounds: &[usize], byte: usize) -> usize {
    bounds.binary_search(&byte).unwrap_or_else(|i| i)
}

/// Split one document's text and attach its metadata to every chunk.
///
/// The metadata is copied from `record` once, with date escape markers
/// removed, and every chunk receives an identical copy. Indices are
/// contiguous from 0.
pub fn chunk_document(
    chunker: &Chunker,
    source_filename: &str,
    text: &str,
    record: &MetadataRecord,
) -> Vec<DocumentChunk> {
    let metadata = record.for_chunks();
    chunker
        .split(text)
        .into_iter()
        .enumerate()
        .map(|(i, piece)| make_chunk(source_filename, i as i64, piece, &metadata))
        .collect()
}

fn make_chunk(
    source_filename: &str,
    index: i64,
    text: &str,
    metadata: &MetadataRecord,
) -> DocumentChunk {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let hash = format!("{:x}", hasher.finalize());

    DocumentChunk {
        id: Uuid::new_v4().to_string(),
        chunk_index: index,
        source_filename: source_filename.to_string(),
        content: text.to_string(),
        hash,
        metadata: metadata.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn covered(text: &str, spans: &[Range<usize>]) -> bool {
        text.char_indices()
            .all(|(i, c)| c.is_whitespace() || spans.iter().any(|s| s.start <= i && i < s.end))
    }

    fn sample_text() -> String {
        (0..40)
            .map(|i| {
                format!(
                    "Paragraph {} covers suturing, airway care and documentation. It has two sentences.",
                    i
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    #[test]
    fn small_text_single_chunk() {
        let chunks = Chunker::new(1000, 200).split("Hello, world!");
        assert_eq!(chunks, vec!["Hello, world!"]);
    }

    #[test]
    fn empty_and_blank_text_have_no_chunks() {
        let chunker = Chunker::new(1000, 200);
        assert!(chunker.split("").is_empty());
        assert!(chunker.split(" \n\n \n").is_empty());
    }

    #[test]
    fn windows_respect_size() {
        let text = sample_text();
        let chunker = Chunker::new(200, 50);
        for piece in chunker.split(&text) {
            assert!(piece.chars().count() <= 200, "oversized: {}", piece.len());
        }
    }

    #[test]
    fn every_character_is_covered() {
        let text = sample_text();
        for (size, overlap) in [(200, 50), (97, 0), (50, 49), (1000, 200)] {
            let spans = Chunker::new(size, overlap).split_spans(&text);
            assert!(covered(&text, &spans), "gap with size={} overlap={}", size, overlap);
        }
    }

    #[test]
    fn consecutive_windows_overlap() {
        let text = sample_text();
        let spans = Chunker::new(200, 50).split_spans(&text);
        assert!(spans.len() > 1);
        for pair in spans.windows(2) {
            assert!(pair[1].start < pair[0].end, "no overlap between {:?}", pair);
            assert!(pair[1].start > pair[0].start);
        }
    }

    #[test]
    fn prefers_paragraph_boundaries() {
        let text = format!("{}\n\n{}", "a ".repeat(30).trim_end(), "b ".repeat(30).trim_end());
        let chunks = Chunker::new(80, 10).split(&text);
        assert!(chunks[0].ends_with("\n\n"));
        assert!(!chunks[0].contains('b'));
    }

    #[test]
    fn hard_split_without_whitespace() {
        let text = "x".repeat(250);
        let spans = Chunker::new(100, 20).split_spans(&text);
        assert_eq!(spans[0], 0..100);
        assert_eq!(spans[1].start, 80);
        assert!(covered(&text, &spans));
    }

    #[test]
    fn multibyte_text_splits_on_char_boundaries() {
        let text = "┌──────────────────┐\n│ Héllo wörld      │\n└──────────────────┘".repeat(5);
        let chunker = Chunker::new(17, 4);
        let chunks = chunker.split(&text);
        assert!(!chunks.is_empty());
        assert!(covered(&text, &chunker.split_spans(&text)));
    }

    #[test]
    fn deterministic() {
        let text = sample_text();
        let chunker = Chunker::new(300, 60);
        assert_eq!(chunker.split_spans(&text), chunker.split_spans(&text));
    }

    #[test]
    fn every_chunk_carries_the_record() {
        let record = MetadataRecord {
            filename: "Suturing.pdf".to_string(),
            policy_number: "11-010-00".to_string(),
            policy_name: "Suturing".to_string(),
            effective_date: "February 10, 2018".to_string(),
            review_due_date: "2026-02-01".to_string(),
            document_type: "Policy".to_string(),
        };
        let text = sample_text();
        let chunks = chunk_document(&Chunker::new(200, 40), "Suturing.pdf", &text, &record);
        assert!(chunks.len() > 1);
        for (i, c) in chunks.iter().enumerate() {
            assert_eq!(c.chunk_index, i as i64);
            assert_eq!(c.metadata, record);
            assert_eq!(c.source_filename, "Suturing.pdf");
            assert_eq!(c.hash.len(), 64);
        }
    }

    #[test]
    fn escape_markers_removed_in_chunk_metadata() {
        let record = MetadataRecord {
            filename: "a.pdf".to_string(),
            effective_date: "'2018-02-10".to_string(),
            review_due_date: "'2026-02-01".to_string(),
            ..Default::default()
        };
        let chunks = chunk_document(&Chunker::new(100, 10), "a.pdf", "Some text.", &record);
        assert_eq!(chunks[0].metadata.effective_date, "2018-02-10");
        assert_eq!(chunks[0].metadata.review_due_date, "2026-02-01");
    }
}
