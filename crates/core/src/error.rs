//! Error types for Veritas.
//!
//! Every fallible operation in the workspace returns [`AppResult`]. Each variant
//! carries a stable [`AppError::kind`] tag so callers can tell "no data",
//! "backend down" and "backend timed out" apart without matching on messages.

use thiserror::Error;

/// Main error type for Veritas.
#[derive(Error, Debug)]
pub enum AppError {
    /// Bad chunking, budget or policy parameters. Raised before any work starts.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The retriever could not be reached or failed mid-search.
    #[error("Retrieval unavailable: {0}")]
    RetrievalUnavailable(String),

    /// No usable generation entry point was resolved.
    #[error("Generation backend unavailable: {0}")]
    BackendUnavailable(String),

    /// Every permitted attempt exceeded the generation timeout.
    #[error("Generation timed out after {attempts} attempt(s) of {timeout_secs}s each")]
    GenerationTimeout { attempts: usize, timeout_secs: u64 },

    /// The backend reported an error or exited non-zero.
    #[error("Generation failed: {0}")]
    GenerationFailed(String),

    /// The `json` preset produced output that does not parse into the expected shape.
    #[error("Malformed structured output: {0}")]
    MalformedStructuredOutput(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Prompt template errors
    #[error("Prompt error: {0}")]
    Prompt(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

impl AppError {
    /// Stable snake_case tag for this error.
    ///
    /// Malformed structured output is a generation failure from the caller's
    /// point of view and reports the same tag.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::InvalidConfiguration(_) => "invalid_configuration",
            AppError::RetrievalUnavailable(_) => "retrieval_unavailable",
            AppError::BackendUnavailable(_) => "backend_unavailable",
            AppError::GenerationTimeout { .. } => "generation_timeout",
            AppError::GenerationFailed(_) | AppError::MalformedStructuredOutput(_) => {
                "generation_failed"
            }
            AppError::Io(_) => "io",
            AppError::Prompt(_) => "prompt",
            AppError::Serialization(_) => "serialization",
            AppError::Other(_) => "other",
        }
    }

    /// True for errors the caller should treat as a failed generation.
    pub fn is_generation_failure(&self) -> bool {
        matches!(
            self,
            AppError::GenerationFailed(_) | AppError::MalformedStructuredOutput(_)
        )
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Result type alias for Veritas operations.
pub type AppResult<T> = Result<T, AppError>;
