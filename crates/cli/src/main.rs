//! Veritas CLI
//!
//! Main entry point for the veritas command-line tool.
//! Answers questions over a local knowledge base with verifiable citations.

mod commands;

use anyhow::Context;
use clap::{Parser, Subcommand};
use commands::{AskCommand, IngestCommand, StatsCommand, WarmupCommand};
use std::path::PathBuf;
use tracing::Instrument;
use veritas_core::{config::AppConfig, logging};

/// Veritas - cited answers from a local knowledge base
#[derive(Parser, Debug)]
#[command(name = "veritas")]
#[command(about = "Cited answers from a local knowledge base", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to workspace directory (default: current directory)
    #[arg(short, long, global = true, env = "VERITAS_WORKSPACE")]
    workspace: Option<PathBuf>,

    /// Path to config file
    #[arg(short, long, global = true, env = "VERITAS_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, env = "RUST_LOG")]
    log_level: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    no_color: bool,

    /// Generation backend (llama-cpp, ollama)
    #[arg(short, long, global = true, env = "VERITAS_BACKEND")]
    backend: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Answer a question from the knowledge base
    Ask(AskCommand),

    /// Chunk documents into the local passage store
    Ingest(IngestCommand),

    /// Resolve the backend and run its one-time warm-up
    Warmup(WarmupCommand),

    /// Show passage store statistics
    Stats(StatsCommand),
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Commands::Ask(_) => "ask",
            Commands::Ingest(_) => "ingest",
            Commands::Warmup(_) => "warmup",
            Commands::Stats(_) => "stats",
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command-line arguments first (needed for logging config)
    let cli = Cli::parse();

    let config = AppConfig::load_with(cli.workspace, cli.config)
        .context("Failed to load configuration")?
        .with_overrides(cli.backend, cli.log_level, cli.verbose, cli.no_color);

    logging::init_logging(config.log_level.as_deref(), config.no_color)?;

    tracing::info!("Veritas CLI starting");
    tracing::debug!(workspace = ?config.workspace, backend = %config.generation.backend, "Configuration loaded");

    let span = tracing::info_span!("command", name = cli.command.name());

    let result = async {
        match cli.command {
            Commands::Ask(cmd) => cmd.execute(&config).await,
            Commands::Ingest(cmd) => cmd.execute(&config).await,
            Commands::Warmup(cmd) => cmd.execute(&config).await,
            Commands::Stats(cmd) => cmd.execute(&config).await,
        }
    }
    .instrument(span)
    .await;

    match &result {
        Ok(_) => tracing::info!("Command completed successfully"),
        Err(e) => tracing::error!("Command failed: {:#}", e),
    }

    result
}
