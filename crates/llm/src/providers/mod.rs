//! Generation backend implementations.

pub mod llama_cpp;
pub mod ollama;

pub use llama_cpp::{LlamaCppClient, LlamaCppSettings};
pub use ollama::OllamaClient;
