use crate::cache::{self, CacheStore};
use crate::document::{Chunk, ChunkSummary};
use crate::metrics::PipelineMetrics;
use crate::oracle::Oracle;
use std::sync::Arc;

use super::SummarizeError;
use super::prompts::build_map_prompt;

/// Summarizes chunks one at a time, caching each result under `{doc_id}_chunk_{index}`.
pub struct MapSummarizer {
    oracle: Arc<dyn Oracle>,
    store: Arc<dyn CacheStore>,
    metrics: Arc<PipelineMetrics>,
}

impl MapSummarizer {
    /// Build a map summarizer with its own metrics registry.
    pub fn new(oracle: Arc<dyn Oracle>, store: Arc<dyn CacheStore>) -> Self {
        Self {
            oracle,
            store,
            metrics: Arc::new(PipelineMetrics::new()),
        }
    }

    /// Report into a shared metrics registry.
    pub fn with_metrics(mut self, metrics: Arc<PipelineMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Summarize a single chunk.
    ///
    /// Unless `force_rerun` is set, a non-empty cached summary is returned without calling the
    /// oracle. Unreadable cache entries are logged and treated as misses. Fresh summaries are
    /// trimmed and written back; a failed write is logged and the summary is still returned.
    pub async fn summarize_chunk(
        &self,
        chunk: &Chunk,
        force_rerun: bool,
    ) -> Result<String, SummarizeError> {
        let key = cache::chunk_summary_key(&chunk.parent_id, chunk.chunk_index);

        if !force_rerun {
            match cache::load::<ChunkSummary>(self.store.as_ref(), &key) {
                Ok(Some(cached)) if !cached.summary.trim().is_empty() => {
                    tracing::debug!(
                        doc_id = %chunk.parent_id,
                        chunk_index = chunk.chunk_index,
                        "Using cached chunk summary"
                    );
                    self.metrics.record_cache_hit();
                    return Ok(cached.summary);
                }
                Ok(_) => {}
                Err(error) => {
                    tracing::warn!(
                        doc_id = %chunk.parent_id,
                        chunk_index = chunk.chunk_index,
                        error = %error,
                        "Failed to read cached chunk summary; regenerating"
                    );
                }
            }
        }

        tracing::info!(
            doc_id = %chunk.parent_id,
            chunk_index = chunk.chunk_index,
            chars = chunk.text.chars().count(),
            "Summarizing chunk"
        );
        let prompt = build_map_prompt(&chunk.text);
        self.metrics.record_oracle_call();
        let response = self.oracle.complete(&prompt).await.inspect_err(|error| {
            tracing::error!(
                doc_id = %chunk.parent_id,
                chunk_index = chunk.chunk_index,
                error = %error,
                "Chunk summarization failed"
            );
        })?;

        let summary = response.trim().to_string();
        if summary.is_empty() {
            tracing::warn!(
                doc_id = %chunk.parent_id,
                chunk_index = chunk.chunk_index,
                "Oracle returned an empty chunk summary"
            );
            return Err(SummarizeError::EmptyResponse);
        }

        let record = ChunkSummary {
            parent_id: chunk.parent_id.clone(),
            chunk_index: chunk.chunk_index,
            summary: summary.clone(),
        };
        if let Err(error) = cache::save(self.store.as_ref(), &key, &record) {
            tracing::error!(
                doc_id = %chunk.parent_id,
                chunk_index = chunk.chunk_index,
                error = %error,
                "Failed to cache chunk summary; next run will regenerate it"
            );
        }

        Ok(summary)
    }

    /// Summarize chunks sequentially, in order, dropping any chunk that fails.
    ///
    /// A dropped chunk's content does not reach the reduce stage; the failure is logged and
    /// counted but never aborts the remaining chunks.
    pub async fn summarize_chunks(&self, chunks: &[Chunk], force_rerun: bool) -> Vec<ChunkSummary> {
        let mut summaries = Vec::with_capacity(chunks.len());

        for chunk in chunks {
            match self.summarize_chunk(chunk, force_rerun).await {
                Ok(summary) => summaries.push(ChunkSummary {
                    parent_id: chunk.parent_id.clone(),
                    chunk_index: chunk.chunk_index,
                    summary,
                }),
                Err(error) => {
                    self.metrics.record_dropped_chunk();
                    tracing::warn!(
                        doc_id = %chunk.parent_id,
                        chunk_index = chunk.chunk_index,
                        error = %error,
                        "Dropping chunk without summary"
                    );
                }
            }
        }

        tracing::info!(
            requested = chunks.len(),
            summarized = summaries.len(),
            "Map stage finished"
        );
        summaries
    }
}
