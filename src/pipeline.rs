//! Single-document orchestration: scrape → normalize → chunk → map → reduce.
//!
//! Stages run strictly in sequence and the pipeline never retries. Every failure, including a
//! panic inside a stage, ends the run as [`PipelineOutcome::Failed`] naming the stage that
//! stopped it; nothing propagates past [`Pipeline::run`] or [`Pipeline::summarize_document`].

use crate::cache::{CacheStore, FsCacheStore, MemoryCacheStore};
use crate::chunker::Chunker;
use crate::config::ChunkerConfig;
use crate::document::{Document, FinalSummary};
use crate::metrics::{MetricsSnapshot, PipelineMetrics};
use crate::oracle::Oracle;
use crate::source::{DocumentSource, Normalizer, SourceError};
use crate::summarizer::{MapSummarizer, ReduceSummarizer, SummarizeError};
use futures_util::FutureExt;
use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

/// Pipeline stage, used to report where a run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Fetching the raw document.
    Scrape,
    /// Cleaning fields and deriving the document id.
    Normalize,
    /// Splitting text into chunks.
    Chunk,
    /// Summarizing chunks.
    Map,
    /// Combining chunk summaries.
    Reduce,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Scrape => "scrape",
            Self::Normalize => "normalize",
            Self::Chunk => "chunk",
            Self::Map => "map",
            Self::Reduce => "reduce",
        };
        f.write_str(name)
    }
}

/// Reasons a pipeline run produced no summary.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The document source failed.
    #[error("failed to fetch document: {0}")]
    Source(#[from] SourceError),
    /// The document had no text to chunk.
    #[error("no chunks created")]
    NoChunks,
    /// Every chunk summary failed.
    #[error("no chunk summaries generated")]
    NoChunkSummaries,
    /// The reduce stage failed.
    #[error("failed to generate final summary: {0}")]
    NoFinalSummary(#[source] SummarizeError),
    /// A stage panicked.
    #[error("stage panicked: {0}")]
    Panicked(String),
}

/// Terminal state of a pipeline run.
#[derive(Debug)]
pub enum PipelineOutcome {
    /// A final summary was produced.
    Done(FinalSummary),
    /// The run stopped at `stage`.
    Failed {
        /// Stage that stopped the run.
        stage: Stage,
        /// Why it stopped.
        error: PipelineError,
    },
}

impl PipelineOutcome {
    /// Final summary text, if the run completed.
    pub fn summary(&self) -> Option<&str> {
        match self {
            Self::Done(summary) => Some(summary.summary.as_str()),
            Self::Failed { .. } => None,
        }
    }

    /// Whether the run completed.
    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done(_))
    }
}

/// Cache stores for each pipeline stage.
#[derive(Clone)]
pub struct PipelineStores {
    /// Chunk lists keyed `{doc_id}_chunks`.
    pub chunks: Arc<dyn CacheStore>,
    /// Chunk summaries keyed `{doc_id}_chunk_{index}`.
    pub chunk_summaries: Arc<dyn CacheStore>,
    /// Final summaries keyed `{doc_id}_final`.
    pub final_summaries: Arc<dyn CacheStore>,
}

impl PipelineStores {
    /// JSON files under `root/chunks`, `root/summaries/map`, and `root/summaries/reduce`.
    pub fn filesystem(root: &Path) -> Self {
        Self {
            chunks: Arc::new(FsCacheStore::new(root.join("chunks"))),
            chunk_summaries: Arc::new(FsCacheStore::new(root.join("summaries").join("map"))),
            final_summaries: Arc::new(FsCacheStore::new(root.join("summaries").join("reduce"))),
        }
    }

    /// Process-local stores that vanish with the pipeline.
    pub fn in_memory() -> Self {
        Self {
            chunks: Arc::new(MemoryCacheStore::new()),
            chunk_summaries: Arc::new(MemoryCacheStore::new()),
            final_summaries: Arc::new(MemoryCacheStore::new()),
        }
    }
}

/// Map-reduce summarization pipeline for single documents.
pub struct Pipeline {
    normalizer: Normalizer,
    chunker: Chunker,
    map: MapSummarizer,
    reduce: ReduceSummarizer,
    metrics: Arc<PipelineMetrics>,
}

impl Pipeline {
    /// Wire the stages around one oracle and a set of caches.
    pub fn new(chunker: ChunkerConfig, oracle: Arc<dyn Oracle>, stores: PipelineStores) -> Self {
        let metrics = Arc::new(PipelineMetrics::new());
        Self {
            normalizer: Normalizer::new(),
            chunker: Chunker::new(chunker, stores.chunks),
            map: MapSummarizer::new(oracle.clone(), stores.chunk_summaries)
                .with_metrics(metrics.clone()),
            reduce: ReduceSummarizer::new(oracle, stores.final_summaries)
                .with_metrics(metrics.clone()),
            metrics,
        }
    }

    /// Counters accumulated across runs of this pipeline.
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Fetch a document from `source`, normalize it, and summarize it.
    pub async fn run(&self, source: &dyn DocumentSource, force_rerun: bool) -> PipelineOutcome {
        tracing::info!(force_rerun, "Starting summarization pipeline");
        let mut stage = Stage::Scrape;
        let result = AssertUnwindSafe(self.execute_source(source, force_rerun, &mut stage))
            .catch_unwind()
            .await;
        self.finish(stage, result)
    }

    /// Summarize an already normalized document.
    pub async fn summarize_document(
        &self,
        document: &Document,
        force_rerun: bool,
    ) -> PipelineOutcome {
        let mut stage = Stage::Chunk;
        let result = AssertUnwindSafe(self.execute(document, force_rerun, &mut stage))
            .catch_unwind()
            .await;
        self.finish(stage, result)
    }

    async fn execute_source(
        &self,
        source: &dyn DocumentSource,
        force_rerun: bool,
        stage: &mut Stage,
    ) -> Result<FinalSummary, PipelineError> {
        let raw = source.fetch().await?;
        tracing::info!(title = %raw.title, "Fetched document");

        *stage = Stage::Normalize;
        let document = self.normalizer.normalize(&raw);
        tracing::info!(doc_id = %document.id, "Normalized document");

        self.execute(&document, force_rerun, stage).await
    }

    async fn execute(
        &self,
        document: &Document,
        force_rerun: bool,
        stage: &mut Stage,
    ) -> Result<FinalSummary, PipelineError> {
        *stage = Stage::Chunk;
        let chunks = self.chunker.chunk(&document.id, &document.text);
        self.metrics.record_chunks(chunks.len() as u64);
        if chunks.is_empty() {
            return Err(PipelineError::NoChunks);
        }

        *stage = Stage::Map;
        let chunk_summaries = self.map.summarize_chunks(&chunks, force_rerun).await;
        if chunk_summaries.is_empty() {
            return Err(PipelineError::NoChunkSummaries);
        }
        if chunk_summaries.len() < chunks.len() {
            tracing::warn!(
                doc_id = %document.id,
                chunks = chunks.len(),
                summarized = chunk_summaries.len(),
                "Some chunks were dropped; final summary will omit their content"
            );
        }

        *stage = Stage::Reduce;
        let texts: Vec<String> = chunk_summaries
            .into_iter()
            .map(|summary| summary.summary)
            .collect();
        let summary = self
            .reduce
            .reduce(&document.id, &document.title, &texts, force_rerun)
            .await
            .map_err(PipelineError::NoFinalSummary)?;

        Ok(FinalSummary {
            doc_id: document.id.clone(),
            summary,
        })
    }

    fn finish(
        &self,
        stage: Stage,
        result: Result<Result<FinalSummary, PipelineError>, Box<dyn Any + Send>>,
    ) -> PipelineOutcome {
        let result = result.unwrap_or_else(|payload| {
            Err(PipelineError::Panicked(panic_message(payload.as_ref())))
        });
        match result {
            Ok(summary) => {
                self.metrics.record_completed();
                tracing::info!(doc_id = %summary.doc_id, "Pipeline completed");
                PipelineOutcome::Done(summary)
            }
            Err(error) => {
                self.metrics.record_failed();
                tracing::error!(stage = %stage, error = %error, "Pipeline failed");
                PipelineOutcome::Failed { stage, error }
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
