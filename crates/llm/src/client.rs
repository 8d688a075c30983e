//! Generation backend abstraction and request/response types.

use serde::{Deserialize, Serialize};
use veritas_core::AppResult;

/// A single generation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmRequest {
    /// Fully rendered prompt text
    pub prompt: String,

    /// Upper bound on generated tokens. Never limits the prompt itself.
    pub max_tokens: u32,

    /// Temperature for sampling, left to the backend default when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

impl LlmRequest {
    /// Create a new request with the default answer length.
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            max_tokens: 400,
            temperature: None,
        }
    }

    /// The zero-output, empty-prompt request used to warm a backend up.
    pub fn warm_up() -> Self {
        Self::new("").with_max_tokens(0)
    }

    /// Set the maximum tokens to generate.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Set the temperature for sampling.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

/// Raw generation output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmResponse {
    /// The generated text, unparsed
    pub content: String,

    /// Backend that produced it (e.g. "llama-cpp", "ollama")
    pub provider: String,

    /// Invocation strategy that succeeded, when the backend has several
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strategy: Option<String>,

    /// Usage statistics
    #[serde(default)]
    pub usage: LlmUsage,
}

/// Token usage statistics.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LlmUsage {
    /// Tokens in the prompt
    #[serde(default)]
    pub prompt_tokens: u32,

    /// Tokens in the completion
    #[serde(default)]
    pub completion_tokens: u32,

    /// Total tokens used
    #[serde(default)]
    pub total_tokens: u32,
}

impl LlmUsage {
    /// Create usage stats from prompt and completion token counts.
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }
}

/// One way of invoking a generation backend.
///
/// Implementations must be cancellation-safe: dropping the `complete` future
/// has to release the underlying process or connection.
#[async_trait::async_trait]
pub trait LlmClient: Send + Sync {
    /// Backend name (e.g., "llama-cpp", "ollama").
    fn provider_name(&self) -> &str;

    /// Label of this invocation strategy, used in logs and responses.
    fn strategy(&self) -> Option<&str> {
        None
    }

    /// Generate a completion for an already rendered prompt.
    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse>;

    /// Pay the one-time start-up cost ahead of the first real request.
    async fn warm_up(&self) -> AppResult<()> {
        self.complete(&LlmRequest::warm_up()).await.map(|_| ())
    }
}
