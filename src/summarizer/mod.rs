//! Map and reduce summarization stages.
//!
//! The map stage summarizes each chunk independently and keeps whatever succeeded; the reduce
//! stage folds the ordered chunk summaries into one document summary with a single oracle call.
//! Both stages read through a [`crate::cache::CacheStore`] unless a rerun is forced, and always
//! write fresh results back.

mod map;
pub mod prompts;
mod reduce;

pub use map::MapSummarizer;
pub use reduce::ReduceSummarizer;

use crate::oracle::OracleError;
use thiserror::Error;

/// Reasons a chunk or document summary could not be produced.
#[derive(Debug, Error)]
pub enum SummarizeError {
    /// The oracle call failed.
    #[error("oracle request failed: {0}")]
    Oracle(#[from] OracleError),
    /// The oracle answered with nothing but whitespace.
    #[error("oracle returned an empty summary")]
    EmptyResponse,
    /// Reduce was invoked without any chunk summaries.
    #[error("no chunk summaries to combine")]
    NothingToReduce,
}
