//! Ingest command handler.
//!
//! Reads an ingestion JSON file and chunks it into the local passage store.

use anyhow::Context;
use clap::Args;
use std::path::PathBuf;
use veritas_core::config::AppConfig;
use veritas_knowledge::IngestRequest;

/// Chunk documents into the local passage store
#[derive(Args, Debug)]
pub struct IngestCommand {
    /// JSON file: {"texts": [...], "docs": [{"id", "text", "metadata"}], "chunk_size", "chunk_overlap"}
    #[arg(short, long)]
    pub file: PathBuf,

    /// Span length in characters (overrides the file)
    #[arg(long)]
    pub chunk_size: Option<usize>,

    /// Characters shared by consecutive spans (overrides the file)
    #[arg(long)]
    pub chunk_overlap: Option<usize>,

    /// Clear the store before ingesting
    #[arg(long)]
    pub reset: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl IngestCommand {
    pub async fn execute(&self, config: &AppConfig) -> anyhow::Result<()> {
        tracing::info!("Executing ingest command");
        tracing::debug!("Ingest options: {:?}", self);

        let contents = std::fs::read_to_string(&self.file)
            .with_context(|| format!("Failed to read {}", self.file.display()))?;
        let mut request: IngestRequest = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse {}", self.file.display()))?;

        if let Some(size) = self.chunk_size {
            request.chunk_size = size;
        }
        if let Some(overlap) = self.chunk_overlap {
            request.chunk_overlap = overlap;
        }

        let stats = veritas_knowledge::ingest_into(config, &request, self.reset)?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&stats)?);
        } else {
            println!(
                "Ingested {} sources ({} passages) into '{}' in {:.2}s",
                stats.sources_count,
                stats.passages_count,
                config.retrieval.index_name,
                stats.duration_secs
            );
        }

        Ok(())
    }
}
