//! Warmup command handler.

use clap::Args;
use std::time::Instant;
use veritas_core::config::AppConfig;
use veritas_llm::create_adapter;

/// Resolve the backend and run its one-time warm-up
#[derive(Args, Debug)]
pub struct WarmupCommand {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl WarmupCommand {
    pub async fn execute(&self, config: &AppConfig) -> anyhow::Result<()> {
        tracing::info!("Executing warmup command");
        config.validate()?;

        let adapter = create_adapter(&config.generation)?;
        let strategies = adapter.strategy_labels();

        let start = Instant::now();
        adapter.warm_up().await?;
        let elapsed = start.elapsed().as_secs_f64();

        if self.json {
            let output = serde_json::json!({
                "backend": config.generation.backend,
                "strategies": strategies,
                "durationSecs": elapsed,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        } else {
            println!(
                "Backend '{}' ready in {:.2}s (strategies: {})",
                config.generation.backend,
                elapsed,
                strategies.join(", ")
            );
        }

        Ok(())
    }
}
