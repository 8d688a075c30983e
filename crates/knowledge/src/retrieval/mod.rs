//! Retriever boundary and the local reference index.

pub mod fusion;
pub mod local;
pub mod trigram;

use veritas_core::{AppResult, Passage, SearchMode};

pub use fusion::{reciprocal_rank_fusion, RRF_K};
pub use local::LocalIndex;

/// Source of ranked passages.
///
/// Implementations return at most `top_k` passages, best first. A `top_k`
/// larger than the corpus returns fewer results, never an error. Calls may
/// run concurrently.
#[async_trait::async_trait]
pub trait Retriever: Send + Sync {
    fn name(&self) -> &str;

    async fn search(&self, query: &str, top_k: usize, mode: SearchMode) -> AppResult<Vec<Passage>>;
}
