use crate::cache::{self, CacheStore};
use crate::document::FinalSummary;
use crate::metrics::PipelineMetrics;
use crate::oracle::Oracle;
use std::sync::Arc;

use super::SummarizeError;
use super::prompts::build_reduce_prompt;

/// Combines chunk summaries into a document summary cached under `{doc_id}_final`.
pub struct ReduceSummarizer {
    oracle: Arc<dyn Oracle>,
    store: Arc<dyn CacheStore>,
    metrics: Arc<PipelineMetrics>,
}

impl ReduceSummarizer {
    /// Build a reduce summarizer with its own metrics registry.
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

    /// Produce the final summary for `doc_id` from ordered chunk summary texts.
    ///
    /// Returns [`SummarizeError::NothingToReduce`] for an empty input without touching the cache
    /// or the oracle. Otherwise a single oracle call is made on a cache miss (or when
    /// `force_rerun` is set), regardless of how many chunk summaries are supplied.
    pub async fn reduce(
        &self,
        doc_id: &str,
        title: &str,
        chunk_summaries: &[String],
        force_rerun: bool,
    ) -> Result<String, SummarizeError> {
        if chunk_summaries.is_empty() {
            return Err(SummarizeError::NothingToReduce);
        }

        let key = cache::final_summary_key(doc_id);

        if !force_rerun {
            match cache::load::<FinalSummary>(self.store.as_ref(), &key) {
                Ok(Some(cached)) if !cached.summary.trim().is_empty() => {
                    tracing::debug!(doc_id, "Using cached final summary");
                    self.metrics.record_cache_hit();
                    return Ok(cached.summary);
                }
                Ok(_) => {}
                Err(error) => {
                    tracing::warn!(
                        doc_id,
                        error = %error,
                        "Failed to read cached final summary; regenerating"
                    );
                }
            }
        }

        tracing::info!(doc_id, inputs = chunk_summaries.len(), "Reducing chunk summaries");
        let prompt = build_reduce_prompt(title, chunk_summaries);
        self.metrics.record_oracle_call();
        let response = self.oracle.complete(&prompt).await.inspect_err(|error| {
            tracing::error!(doc_id, error = %error, "Reduce summarization failed");
        })?;

        let summary = response.trim().to_string();
        if summary.is_empty() {
            tracing::warn!(doc_id, "Oracle returned an empty final summary");
            return Err(SummarizeError::EmptyResponse);
        }

        let record = FinalSummary {
            doc_id: doc_id.to_string(),
            summary: summary.clone(),
        };
        if let Err(error) = cache::save(self.store.as_ref(), &key, &record) {
            tracing::error!(
                doc_id,
                error = %error,
                "Failed to cache final summary; next run will regenerate it"
            );
        }

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCacheStore;
    use crate::summarizer::test_support::{BrokenStore, ScriptedOracle};

    fn summaries(texts: &[&str]) -> Vec<String> {
        texts.iter().map(|text| text.to_string()).collect()
    }

    #[tokio::test]
    async fn empty_input_short_circuits() {
        let oracle = Arc::new(ScriptedOracle::new(vec![Ok("unused")]));
        let store = Arc::new(MemoryCacheStore::new());
        let reduce = ReduceSummarizer::new(oracle.clone(), store.clone());

        let error = reduce
            .reduce("doc_abc", "Title", &[], false)
            .await
            .expect_err("nothing to reduce");

        assert!(matches!(error, SummarizeError::NothingToReduce));
        assert_eq!(oracle.calls(), 0);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn single_call_combines_all_summaries_in_order() {
        let oracle = Arc::new(ScriptedOracle::new(vec![Ok(" Final \n")]));
        let store = Arc::new(MemoryCacheStore::new());
        let reduce = ReduceSummarizer::new(oracle.clone(), store.clone());

        let summary = reduce
            .reduce("doc_abc", "Water Bill", &summaries(&["S1", "S2", "S3"]), false)
            .await
            .expect("final");

        assert_eq!(summary, "Final");
        assert_eq!(oracle.calls(), 1);
        let prompt = &oracle.prompts()[0];
        assert!(prompt.contains("Document title: Water Bill"));
        assert!(prompt.contains("Chunk 1: S1\n\nChunk 2: S2\n\nChunk 3: S3"));

        let cached: FinalSummary = cache::load(store.as_ref(), "doc_abc_final")
            .expect("load")
            .expect("entry");
        assert_eq!(cached.doc_id, "doc_abc");
        assert_eq!(cached.summary, "Final");
    }

    #[tokio::test]
    async fn cached_summary_skips_oracle_unless_forced() {
        let oracle = Arc::new(ScriptedOracle::new(vec![Ok("first"), Ok("second")]));
        let store = Arc::new(MemoryCacheStore::new());
        let reduce = ReduceSummarizer::new(oracle.clone(), store.clone());
        let inputs = summaries(&["S1"]);

        reduce.reduce("doc_abc", "T", &inputs, false).await.expect("seed");
        let cached = reduce.reduce("doc_abc", "T", &inputs, false).await.expect("cached");
        assert_eq!(cached, "first");
        assert_eq!(oracle.calls(), 1);

        let forced = reduce.reduce("doc_abc", "T", &inputs, true).await.expect("forced");
        assert_eq!(forced, "second");
        assert_eq!(oracle.calls(), 2);
        let stored: FinalSummary = cache::load(store.as_ref(), "doc_abc_final")
            .expect("load")
            .expect("entry");
        assert_eq!(stored.summary, "second");
    }

    #[tokio::test]
    async fn oracle_failure_yields_error() {
        let oracle = Arc::new(ScriptedOracle::new(vec![Err("model crashed")]));
        let store = Arc::new(MemoryCacheStore::new());
        let reduce = ReduceSummarizer::new(oracle, store.clone());

        let error = reduce
            .reduce("doc_abc", "T", &summaries(&["S1"]), false)
            .await
            .expect_err("failure");
        assert!(matches!(error, SummarizeError::Oracle(_)));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn unusable_cache_still_returns_fresh_summary() {
        let oracle = Arc::new(ScriptedOracle::new(vec![Ok(" ok ")]));
        let reduce = ReduceSummarizer::new(oracle.clone(), Arc::new(BrokenStore));

        let summary = reduce
            .reduce("doc_abc", "T", &summaries(&["S1", "S2"]), false)
            .await
            .expect("summary despite cache errors");

        assert_eq!(summary, "ok");
        assert_eq!(oracle.calls(), 1);
    }
}
