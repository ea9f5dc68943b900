//! Document intake: where raw documents come from and how they become [`Document`]s.
//!
//! Scraping lives outside this crate; sources here hand over records that were already
//! fetched (an in-memory fixture or a JSON file written by a scraper). The [`Normalizer`] only
//! tidies whitespace and derives the stable document id.

use crate::document::{Document, document_id};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while obtaining a raw document.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Source file could not be read.
    #[error("failed to read document from {path}: {source}")]
    Io {
        /// Path being read.
        path: PathBuf,
        /// Underlying filesystem error.
        #[source]
        source: std::io::Error,
    },
    /// Source contents were not a valid raw document.
    #[error("failed to parse document from {path}: {source}")]
    Parse {
        /// Path being read.
        path: PathBuf,
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },
}

/// Record handed over by a scraper before normalization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawDocument {
    /// Document title.
    pub title: String,
    /// Publication date as reported by the source.
    pub date: String,
    /// Body text.
    pub text: String,
    /// Canonical URL of the document.
    pub source_url: String,
    /// Source family (`congress`, `kansas`, ...).
    pub source_type: String,
}

/// Anything that can produce a raw document for the pipeline.
#[async_trait]
pub trait DocumentSource: Send + Sync {
    /// Fetch the raw document.
    async fn fetch(&self) -> Result<RawDocument, SourceError>;
}

/// Source returning a fixed, in-memory document.
#[derive(Debug, Clone)]
pub struct StaticSource {
    document: RawDocument,
}

impl StaticSource {
    /// Wrap an already available raw document.
    pub fn new(document: RawDocument) -> Self {
        Self { document }
    }

    /// Built-in sample document used by `civicwatch run --mock`.
    pub fn sample() -> Self {
        Self::new(RawDocument {
            title: "Test Civic Document".into(),
            date: "2025-01-01".into(),
            text: "This is a test document about civic matters. It contains important \
                   information that citizens should know. The document discusses various \
                   policy issues and legislative actions."
                .into(),
            source_url: "https://example.com/test".into(),
            source_type: "test".into(),
        })
    }
}

#[async_trait]
impl DocumentSource for StaticSource {
    async fn fetch(&self) -> Result<RawDocument, SourceError> {
        Ok(self.document.clone())
    }
}

/// Source reading a raw document serialized as JSON on disk.
#[derive(Debug, Clone)]
pub struct JsonFileSource {
    path: PathBuf,
}

impl JsonFileSource {
    /// Read from `path` when fetched.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl DocumentSource for JsonFileSource {
    async fn fetch(&self) -> Result<RawDocument, SourceError> {
        let contents = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|source| SourceError::Io {
                path: self.path.clone(),
                source,
            })?;
        serde_json::from_str(&contents).map_err(|source| SourceError::Parse {
            path: self.path.clone(),
            source,
        })
    }
}

/// Turns raw documents into pipeline input.
#[derive(Debug, Clone, Copy, Default)]
pub struct Normalizer;

impl Normalizer {
    /// Create a normalizer.
    pub fn new() -> Self {
        Self
    }

    /// Clean the title and body text and derive the document id.
    ///
    /// Whitespace runs inside a paragraph collapse to a single space while blank-line
    /// paragraph breaks survive, so the chunker can still split on them. The date is passed
    /// through unchanged.
    pub fn normalize(&self, raw: &RawDocument) -> Document {
        let title = collapse_whitespace(&raw.title);
        let date = raw.date.trim().to_string();
        let source_type = match raw.source_type.trim() {
            "" => "unknown".to_string(),
            value => value.to_string(),
        };

        Document {
            id: document_id(&raw.source_url, &title, &date),
            source_type,
            title,
            date,
            text: clean_text(&raw.text),
        }
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn clean_text(text: &str) -> String {
    let mut paragraphs = Vec::new();
    let mut current = Vec::new();

    for line in text.lines() {
        if line.trim().is_empty() {
            if !current.is_empty() {
                paragraphs.push(collapse_whitespace(&current.join(" ")));
                current.clear();
            }
        } else {
            current.push(line);
        }
    }
    if !current.is_empty() {
        paragraphs.push(collapse_whitespace(&current.join(" ")));
    }

    paragraphs.join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_keeps_paragraph_breaks() {
        let raw = RawDocument {
            title: "  Hearing   on\nWater Rights ".into(),
            date: " 2025-02-03 ".into(),
            text: "First   line\ncontinues here.\n\n\n  Second\tparagraph.  \n".into(),
            source_url: "https://example.com/h".into(),
            source_type: "kansas".into(),
        };

        let document = Normalizer::new().normalize(&raw);

        assert_eq!(document.title, "Hearing on Water Rights");
        assert_eq!(document.date, "2025-02-03");
        assert_eq!(document.source_type, "kansas");
        assert_eq!(
            document.text,
            "First line continues here.\n\nSecond paragraph."
        );
        assert_eq!(
            document.id,
            document_id("https://example.com/h", "Hearing on Water Rights", "2025-02-03")
        );
    }

    #[test]
    fn normalize_defaults_missing_source_type() {
        let document = Normalizer::new().normalize(&RawDocument::default());
        assert_eq!(document.source_type, "unknown");
        assert!(document.text.is_empty());
    }

    #[test]
    fn same_raw_document_maps_to_same_id() {
        let raw = StaticSource::sample().document;
        let normalizer = Normalizer::new();
        assert_eq!(normalizer.normalize(&raw).id, normalizer.normalize(&raw).id);
    }

    #[tokio::test]
    async fn json_file_source_reads_partial_records() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("raw.json");
        std::fs::write(&path, r#"{"title": "HB 1", "text": "Body"}"#).expect("write");

        let raw = JsonFileSource::new(&path).fetch().await.expect("fetch");
        assert_eq!(raw.title, "HB 1");
        assert_eq!(raw.text, "Body");
        assert!(raw.source_url.is_empty());
    }

    #[tokio::test]
    async fn json_file_source_reports_missing_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let error = JsonFileSource::new(dir.path().join("absent.json"))
            .fetch()
            .await
            .expect_err("missing");
        assert!(matches!(error, SourceError::Io { .. }));
    }
}
