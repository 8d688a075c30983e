//! Backend identifiers.

use veritas_core::{AppError, AppResult};

/// Generation backends Veritas can drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderType {
    /// llama.cpp command-line binary, one subprocess per request
    LlamaCpp,
    /// Ollama HTTP service
    Ollama,
}

impl ProviderType {
    /// Parse provider type from string.
    pub fn parse(s: &str) -> AppResult<Self> {
        match s.trim().to_lowercase().as_str() {
            "llama-cpp" | "llama.cpp" | "llamacpp" => Ok(Self::LlamaCpp),
            "ollama" => Ok(Self::Ollama),
            other => Err(AppError::InvalidConfiguration(format!(
                "Unknown backend: {}. Supported: llama-cpp, ollama",
                other
            ))),
        }
    }

    /// Get the canonical provider name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LlamaCpp => "llama-cpp",
            Self::Ollama => "ollama",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_type_parsing() {
        assert_eq!(ProviderType::parse("llama-cpp").unwrap(), ProviderType::LlamaCpp);
        assert_eq!(ProviderType::parse("llama.cpp").unwrap(), ProviderType::LlamaCpp);
        assert_eq!(ProviderType::parse("Ollama").unwrap(), ProviderType::Ollama);
        assert!(ProviderType::parse("openai").is_err());
    }

    #[test]
    fn test_round_trip_name() {
        let p = ProviderType::LlamaCpp;
        assert_eq!(ProviderType::parse(p.as_str()).unwrap(), p);
    }
}
