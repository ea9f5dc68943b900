#![deny(missing_docs)]

//! Core library for the CivicWatch summarization pipeline.

/// Persistent key-value caches for chunks and summaries.
pub mod cache;
/// Paragraph-preserving document chunker.
pub mod chunker;
/// Environment-driven configuration management.
pub mod config;
/// Document, chunk, and summary records.
pub mod document;
/// Structured logging and tracing setup.
pub mod logging;
/// Pipeline counters.
pub mod metrics;
/// Language-model completion client abstraction and adapters.
pub mod oracle;
/// Chunk → map → reduce orchestration for a single document.
pub mod pipeline;
/// Document intake and normalization.
pub mod source;
/// Map and reduce summarization stages.
pub mod summarizer;
