//! Stats command handler.

use clap::Args;
use veritas_core::config::AppConfig;

/// Show passage store statistics
#[derive(Args, Debug)]
pub struct StatsCommand {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl StatsCommand {
    pub async fn execute(&self, config: &AppConfig) -> anyhow::Result<()> {
        tracing::info!("Executing stats command");

        let stats = veritas_knowledge::stats(config)?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&stats)?);
        } else {
            println!("Index: {}", stats.index_name);
            println!("Sources: {}", stats.sources_count);
            println!("Passages: {}", stats.passages_count);
            println!("Size: {} bytes", stats.size_bytes);
            match stats.last_ingested_at {
                Some(at) => println!("Last ingest: {}", at.to_rfc3339()),
                None => println!("Last ingest: never"),
            }
        }

        Ok(())
    }
}
