//! Command handlers for the Veritas CLI.

pub mod ask;
pub mod ingest;
pub mod stats;
pub mod warmup;

// Re-export command types for convenience
pub use ask::AskCommand;
pub use ingest::IngestCommand;
pub use stats::StatsCommand;
pub use warmup::WarmupCommand;
