//! Records flowing through the pipeline.
//!
//! A [`Document`] is produced once by the normalizer and never mutated. Its `id` partitions
//! every cache entry downstream, so the same logical document must always hash to the same id.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Normalized civic document handed to the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// Stable content hash, see [`document_id`].
    pub id: String,
    /// Origin of the document (`congress`, `kansas`, `test`, ...).
    pub source_type: String,
    /// Human-readable title.
    pub title: String,
    /// Publication date as supplied by the source.
    pub date: String,
    /// Cleaned body text; paragraphs are separated by blank lines.
    pub text: String,
}

/// One overlapping text segment of a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Id of the document the chunk belongs to.
    pub parent_id: String,
    /// Zero-based position in the parent's chunk sequence.
    pub chunk_index: usize,
    /// Segment text, trimmed of edge whitespace.
    pub text: String,
}

/// Oracle summary of a single chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkSummary {
    /// Id of the document the chunk belongs to.
    pub parent_id: String,
    /// Index of the summarized chunk.
    pub chunk_index: usize,
    /// Non-empty summary text.
    pub summary: String,
}

/// Document-level summary combined from chunk summaries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalSummary {
    /// Id of the summarized document.
    pub doc_id: String,
    /// Final summary text.
    pub summary: String,
}

/// Derive the stable document id from its source URL, title, and date.
///
/// The id is `doc_` followed by the first 16 hex characters of
/// `sha256("{source_url}|{title}|{date}")`.
pub fn document_id(source_url: &str, title: &str, date: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("{source_url}|{title}|{date}").as_bytes());
    let digest = hex::encode(hasher.finalize());
    format!("doc_{}", &digest[..16])
}
