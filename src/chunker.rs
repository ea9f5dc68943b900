//! Paragraph-preserving chunking with character overlap.
//!
//! Documents are split on blank lines and paragraphs are packed greedily into chunks of at most
//! `target_size` characters (a single oversized paragraph still becomes its own chunk). When a
//! chunk is closed, the next one is seeded with the last `overlap_size` characters of the closed
//! buffer so that sentences straddling a boundary stay visible to both map prompts.
//!
//! Lengths are measured in Unicode scalar values, not bytes, so overlap slicing never splits a
//! character.

use crate::cache::{self, CacheStore};
use crate::config::ChunkerConfig;
use crate::document::Chunk;
use std::sync::Arc;

const PARAGRAPH_SEPARATOR: &str = "\n\n";
const SEPARATOR_LEN: usize = PARAGRAPH_SEPARATOR.len();

/// Splits documents into overlapping chunks and persists the result.
pub struct Chunker {
    config: ChunkerConfig,
    store: Arc<dyn CacheStore>,
}

impl Chunker {
    /// Build a chunker that persists chunk lists into `store`.
    pub fn new(config: ChunkerConfig, store: Arc<dyn CacheStore>) -> Self {
        Self { config, store }
    }

    /// Split `text` into chunks and persist them under `{doc_id}_chunks`.
    ///
    /// Chunking is cheap and deterministic, so it always recomputes and overwrites any prior
    /// chunk list. A failed write is logged and does not affect the returned chunks. Empty or
    /// whitespace-only text yields an empty vector.
    pub fn chunk(&self, doc_id: &str, text: &str) -> Vec<Chunk> {
        let chunks = split_into_chunks(doc_id, text, &self.config);

        let key = cache::chunks_key(doc_id);
        if let Err(error) = cache::save(self.store.as_ref(), &key, &chunks) {
            tracing::warn!(doc_id, error = %error, "Failed to persist chunk list");
        }

        tracing::info!(
            doc_id,
            chunks = chunks.len(),
            target_size = self.config.target_size,
            overlap_size = self.config.overlap_size(),
            "Chunked document"
        );
        chunks
    }
}

/// Pure chunking routine behind [`Chunker::chunk`].
pub fn split_into_chunks(doc_id: &str, text: &str, config: &ChunkerConfig) -> Vec<Chunk> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }

    let overlap_size = config.overlap_size();
    let mut chunks = Vec::new();
    let mut buffer = String::new();
    let mut buffer_len = 0usize;

    for paragraph in split_paragraphs(text) {
        let paragraph_len = paragraph.chars().count();

        if !buffer.is_empty() && buffer_len + paragraph_len + SEPARATOR_LEN > config.target_size {
            close_chunk(doc_id, &buffer, &mut chunks);

            if overlap_size > 0 {
                let tail = tail_chars(&buffer, overlap_size).to_string();
                buffer = tail;
                buffer.push_str(PARAGRAPH_SEPARATOR);
                buffer.push_str(&paragraph);
            } else {
                buffer = paragraph;
            }
            buffer_len = buffer.chars().count();
        } else if buffer.is_empty() {
            buffer_len = paragraph_len;
            buffer = paragraph;
        } else {
            buffer.push_str(PARAGRAPH_SEPARATOR);
            buffer.push_str(&paragraph);
            buffer_len += SEPARATOR_LEN + paragraph_len;
        }
    }

    if !buffer.trim().is_empty() {
        close_chunk(doc_id, &buffer, &mut chunks);
    }

    if chunks.is_empty() {
        chunks.push(Chunk {
            parent_id: doc_id.to_string(),
            chunk_index: 0,
            text: trimmed.to_string(),
        });
    }

    chunks
}

fn close_chunk(doc_id: &str, buffer: &str, chunks: &mut Vec<Chunk>) {
    chunks.push(Chunk {
        parent_id: doc_id.to_string(),
        chunk_index: chunks.len(),
        text: buffer.trim().to_string(),
    });
}

/// Split text on blank lines, trimming each paragraph and skipping empty ones.
fn split_paragraphs(text: &str) -> Vec<String> {
    let mut paragraphs = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for line in text.lines() {
        if line.trim().is_empty() {
            push_paragraph(&mut paragraphs, &current);
            current.clear();
        } else {
            current.push(line);
        }
    }
    push_paragraph(&mut paragraphs, &current);

    paragraphs
}

fn push_paragraph(paragraphs: &mut Vec<String>, lines: &[&str]) {
    let joined = lines.join("\n");
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        paragraphs.push(trimmed.to_string());
    }
}

/// Return the last `count` characters of `text` (the whole string when shorter).
fn tail_chars(text: &str, count: usize) -> &str {
    if count == 0 {
        return "";
    }
    match text.char_indices().rev().nth(count - 1) {
        Some((offset, _)) => &text[offset..],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCacheStore;

    fn config(target_size: usize, overlap_ratio: f64) -> ChunkerConfig {
        ChunkerConfig {
            target_size,
            overlap_ratio,
        }
    }

    #[test]
    fn empty_text_produces_no_chunks() {
        assert!(split_into_chunks("doc", "", &config(100, 0.1)).is_empty());
        assert!(split_into_chunks("doc", "  \n\n \t", &config(100, 0.1)).is_empty());
    }

    #[test]
    fn short_text_becomes_single_chunk() {
        let chunks = split_into_chunks("doc", "  A short notice.  ", &config(100, 0.15));
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].chunk_index, 0);
        assert_eq!(chunks[0].parent_id, "doc");
        assert_eq!(chunks[0].text, "A short notice.");
    }

    #[test]
    fn paragraphs_that_fit_share_a_chunk() {
        let text = "First paragraph.\n\nSecond paragraph.";
        let chunks = split_into_chunks("doc", text, &config(100, 0.0));
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "First paragraph.\n\nSecond paragraph.");
    }

    #[test]
    fn overflow_without_overlap_starts_fresh_chunk() {
        let text = "aaaaaaaaaa\n\nbbbbbbbbbb\n\ncccccccccc";
        let chunks = split_into_chunks("doc", text, &config(22, 0.0));
        let texts: Vec<&str> = chunks.iter().map(|chunk| chunk.text.as_str()).collect();
        assert_eq!(texts, vec!["aaaaaaaaaa\n\nbbbbbbbbbb", "cccccccccc"]);
        assert_eq!(chunks[1].chunk_index, 1);
    }

    #[test]
    fn overflow_with_overlap_seeds_next_chunk_with_tail() {
        let text = "aaaaaaaaaa\n\nbbbbbbbbbb\n\ncccccccccc";
        let chunks = split_into_chunks("doc", text, &config(22, 0.25));
        assert_eq!(chunks.len(), 2);
        // overlap_size = floor(22 * 0.25) = 5
        assert_eq!(chunks[1].text, "bbbbb\n\ncccccccccc");
    }

    #[test]
    fn oversized_paragraph_is_kept_whole() {
        let long = "x".repeat(50);
        let chunks = split_into_chunks("doc", &long, &config(10, 0.2));
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, long);
    }

    #[test]
    fn blank_lines_with_whitespace_split_paragraphs() {
        let paragraphs = split_paragraphs("one\r\n  \r\ntwo\nstill two\n\n\n three ");
        assert_eq!(paragraphs, vec!["one", "two\nstill two", "three"]);
    }

    #[test]
    fn tail_chars_respects_multibyte_boundaries() {
        assert_eq!(tail_chars("héllo wörld", 5), "wörld");
        assert_eq!(tail_chars("abc", 10), "abc");
        assert_eq!(tail_chars("abc", 0), "");
    }

    #[test]
    fn indices_are_sequential_and_paragraphs_stay_in_order() {
        let paragraphs: Vec<String> = (0..12)
            .map(|i| format!("Paragraph {i} discusses appropriation line {i}."))
            .collect();
        let text = paragraphs.join("\n\n");
        let chunks = split_into_chunks("doc", &text, &config(120, 0.1));
        assert!(chunks.len() > 1);

        for (expected, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.chunk_index, expected);
        }

        let mut search_from = (0usize, 0usize);
        for paragraph in &paragraphs {
            let found = chunks
                .iter()
                .enumerate()
                .skip(search_from.0)
                .find_map(|(index, chunk)| {
                    let start = if index == search_from.0 { search_from.1 } else { 0 };
                    chunk.text[start..]
                        .find(paragraph.as_str())
                        .map(|offset| (index, start + offset + paragraph.len()))
                });
            search_from = found.unwrap_or_else(|| panic!("missing paragraph: {paragraph}"));
        }
    }

    #[test]
    fn consecutive_chunks_share_overlap_prefix() {
        let paragraphs: Vec<String> = (0..8)
            .map(|i| format!("Item {i}: the board approved contract number {i} for road repair."))
            .collect();
        let text = paragraphs.join("\n\n");
        let cfg = config(150, 0.2);
        let chunks = split_into_chunks("doc", &text, &cfg);
        assert!(chunks.len() > 1);

        for pair in chunks.windows(2) {
            let tail = tail_chars(&pair[0].text, cfg.overlap_size());
            assert!(
                pair[1].text.starts_with(tail.trim_start()),
                "chunk {} should start with {:?}",
                pair[1].chunk_index,
                tail
            );
        }
    }

    #[test]
    fn chunk_persists_and_overwrites_chunk_list() {
        let store = Arc::new(MemoryCacheStore::new());
        let chunker = Chunker::new(config(100, 0.1), store.clone());

        chunker.chunk("doc_1", "First version.");
        chunker.chunk("doc_1", "Second version.");

        let stored: Vec<Chunk> = cache::load(store.as_ref(), "doc_1_chunks")
            .expect("load")
            .expect("entry");
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].text, "Second version.");
        assert_eq!(store.len(), 1);
    }
}
