//! Veritas Core Library
//!
//! Foundations shared by every Veritas crate:
//! - Error handling (`AppError`, `AppResult`)
//! - Logging infrastructure
//! - Layered configuration
//! - The request-scoped data model (`Passage`, `Context`, `CitationManifest`)
//! - Token estimation

pub mod config;
pub mod error;
pub mod logging;
pub mod passage;
pub mod tokens;

// Re-export commonly used types
pub use config::{AppConfig, GenerationConfig, InvocationStrategy, RagConfig, RetrievalConfig};
pub use error::{AppError, AppResult};
pub use passage::{CitationManifest, Context, ManifestEntry, Passage, SearchMode};
pub use tokens::TokenEstimator;
