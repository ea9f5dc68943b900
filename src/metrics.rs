use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters describing pipeline activity.
#[derive(Default)]
pub struct PipelineMetrics {
    documents_completed: AtomicU64,
    documents_failed: AtomicU64,
    chunks_created: AtomicU64,
    oracle_calls: AtomicU64,
    cache_hits: AtomicU64,
    chunks_dropped: AtomicU64,
}

impl PipelineMetrics {
    /// Create an empty metrics accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a document that produced a final summary.
    pub fn record_completed(&self) {
        self.documents_completed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a document whose run ended in a failed stage.
    pub fn record_failed(&self) {
        self.documents_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record the number of chunks produced for a document.
    pub fn record_chunks(&self, count: u64) {
        self.chunks_created.fetch_add(count, Ordering::Relaxed);
    }

    /// Record one completion request sent to the oracle.
    pub fn record_oracle_call(&self) {
        self.oracle_calls.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a summary served from cache.
    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a chunk whose summary could not be produced.
    pub fn record_dropped_chunk(&self) {
        self.chunks_dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Return a snapshot of the current counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            documents_completed: self.documents_completed.load(Ordering::Relaxed),
            documents_failed: self.documents_failed.load(Ordering::Relaxed),
            chunks_created: self.chunks_created.load(Ordering::Relaxed),
            oracle_calls: self.oracle_calls.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            chunks_dropped: self.chunks_dropped.load(Ordering::Relaxed),
        }
    }
}

/// Immutable view of pipeline counters used for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct MetricsSnapshot {
    /// Documents that reached a final summary.
    pub documents_completed: u64,
    /// Documents whose run failed.
    pub documents_failed: u64,
    /// Total chunks produced.
    pub chunks_created: u64,
    /// Completion requests sent to the oracle (map and reduce).
    pub oracle_calls: u64,
    /// Summaries served from cache (map and reduce).
    pub cache_hits: u64,
    /// Chunks dropped because their summary failed.
    pub chunks_dropped: u64,
}
