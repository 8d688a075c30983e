//! Generation backend integration for Veritas.
//!
//! The [`GenerationAdapter`] is the single entry point the RAG pipeline uses
//! to turn a rendered prompt into raw text. Behind it sit one or more
//! [`LlmClient`] strategies:
//!
//! # Backends
//! - **llama.cpp**: local binary, one subprocess per request (default)
//! - **Ollama**: local HTTP service
//!
//! # Example
//! ```no_run
//! use veritas_core::GenerationConfig;
//! use veritas_llm::create_adapter;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let adapter = create_adapter(&GenerationConfig::default())?;
//! let response = adapter.generate("Say hello.", 64).await?;
//! println!("{}", response.content);
//! # Ok(())
//! # }
//! ```

pub mod adapter;
pub mod client;
pub mod discovery;
pub mod factory;
pub mod providers;
pub mod types;

// Re-export main types
pub use adapter::GenerationAdapter;
pub use client::{LlmClient, LlmRequest, LlmResponse, LlmUsage};
pub use discovery::ResolvedBackend;
pub use factory::{create_adapter, create_chain};
pub use providers::{LlamaCppClient, OllamaClient};
pub use types::ProviderType;
