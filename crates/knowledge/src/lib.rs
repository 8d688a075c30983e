//! Retrieval-augmented answering core.
//!
//! Turns ranked passages into a bounded, citation-tracked prompt, dispatches
//! it to the generation backend and maps the answer back onto its sources.
//! Also ships a local passage store and reference retriever so a workspace is
//! usable without an external search service.

pub mod aggregator;
pub mod assembler;
pub mod chunker;
pub mod ingest;
pub mod rag;
pub mod retrieval;
pub mod store;
pub mod types;

#[cfg(test)]
mod tests;

// Re-export commonly used types
pub use aggregator::{aggregate, AggregationPolicy};
pub use assembler::{AnswerAssembler, AssembledAnswer};
pub use chunker::{chunk_document, chunk_text};
pub use rag::{AnswerWarning, AskRequest, AskResponse, Citation, RagPipeline};
pub use retrieval::{LocalIndex, Retriever};
pub use store::PassageStore;
pub use types::{IngestDoc, IngestRequest, IngestStats, SourceRecord, StoreStats};

use veritas_core::{AppConfig, AppResult};

/// Ingest into the workspace's configured index, optionally clearing it first.
pub fn ingest_into(
    config: &AppConfig,
    request: &IngestRequest,
    reset: bool,
) -> AppResult<IngestStats> {
    let index_name = &config.retrieval.index_name;
    tracing::info!(index = %index_name, reset, "Starting ingest");

    ingest::validate_request(request)?;
    config.ensure_veritas_dir()?;

    let store = PassageStore::new(config.index_dir());
    if reset {
        store.clear()?;
    }

    ingest::ingest(&store, request)
}

/// Statistics for the workspace's configured index.
pub fn stats(config: &AppConfig) -> AppResult<StoreStats> {
    let index_name = &config.retrieval.index_name;
    tracing::info!(index = %index_name, "Getting store stats");

    PassageStore::new(config.index_dir()).stats(index_name)
}

/// Answer one question against the workspace, building a fresh pipeline.
pub async fn ask(config: &AppConfig, request: AskRequest) -> AppResult<AskResponse> {
    RagPipeline::from_config(config)?.ask(request).await
}
