//! Generation adapter factory.
//!
//! Turns [`GenerationConfig`] into a ready [`GenerationAdapter`]: resolves the
//! backend once, builds one client per invocation strategy and wraps them in
//! the bounded pool.

use std::sync::Arc;
use std::time::Duration;

use veritas_core::{AppResult, GenerationConfig};

use crate::adapter::GenerationAdapter;
use crate::client::LlmClient;
use crate::discovery;
use crate::providers::{LlamaCppClient, LlamaCppSettings, OllamaClient};
use crate::types::ProviderType;

/// Build the generation adapter described by `config`.
///
/// # Errors
/// - `InvalidConfiguration` for an unknown backend
/// - `BackendUnavailable` when no llama.cpp binary or model can be resolved
pub fn create_adapter(config: &GenerationConfig) -> AppResult<GenerationAdapter> {
    let chain = create_chain(config)?;
    Ok(
        GenerationAdapter::new(
            chain,
            config.max_concurrency,
            Duration::from_secs(config.timeout_secs),
        )
        .with_warmup_timeout(Duration::from_secs(config.warmup_timeout_secs)),
    )
}

/// Ordered invocation strategies for the configured backend.
pub fn create_chain(config: &GenerationConfig) -> AppResult<Vec<Arc<dyn LlmClient>>> {
    match ProviderType::parse(&config.backend)? {
        ProviderType::LlamaCpp => {
            let resolved = discovery::resolve(config)?;
            let settings = LlamaCppSettings {
                binary: resolved.binary,
                model: resolved.model,
                gpu_layers: config.gpu_layers.clone(),
                threads: config.threads,
                extra_args: config.extra_args.clone(),
            };
            Ok(resolved
                .strategies
                .into_iter()
                .map(|strategy| {
                    Arc::new(LlamaCppClient::new(settings.clone(), strategy)) as Arc<dyn LlmClient>
                })
                .collect())
        }
        ProviderType::Ollama => {
            let client = OllamaClient::new(&config.ollama_endpoint, &config.ollama_model);
            Ok(vec![Arc::new(client) as Arc<dyn LlmClient>])
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use veritas_core::InvocationStrategy;

    #[test]
    fn test_create_ollama_adapter() {
        let config = GenerationConfig {
            backend: "ollama".to_string(),
            ..Default::default()
        };
        let adapter = create_adapter(&config).unwrap();
        assert_eq!(adapter.strategy_labels(), vec!["ollama"]);
        assert_eq!(adapter.timeout(), Duration::from_secs(120));
    }

    #[test]
    fn test_unknown_backend() {
        let config = GenerationConfig {
            backend: "openai".to_string(),
            ..Default::default()
        };
        assert_eq!(
            create_adapter(&config).unwrap_err().kind(),
            "invalid_configuration"
        );
    }

    #[test]
    fn test_llama_cpp_without_model_is_unavailable() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = GenerationConfig {
            backend: "llama-cpp".to_string(),
            binary: Some(dir.path().join("missing")),
            binary_candidates: Vec::new(),
            model_search_dirs: vec![dir.path().to_path_buf()],
            ..Default::default()
        };
        assert_eq!(
            create_adapter(&config).unwrap_err().kind(),
            "backend_unavailable"
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_llama_cpp_chain_uses_configured_strategies() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::TempDir::new().unwrap();
        let binary = dir.path().join("llama-simple");
        std::fs::write(&binary, "#!/bin/sh\n").unwrap();
        std::fs::set_permissions(&binary, std::fs::Permissions::from_mode(0o755)).unwrap();
        let model: PathBuf = dir.path().join("tiny.gguf");
        std::fs::write(&model, b"gguf").unwrap();

        let mut config = GenerationConfig {
            backend: "llama-cpp".to_string(),
            binary: Some(binary),
            model_path: Some(model),
            ..Default::default()
        };
        let adapter = create_adapter(&config).unwrap();
        assert_eq!(
            adapter.strategy_labels(),
            vec!["llama-cpp:positional", "llama-cpp:promptFlag"]
        );

        config.strategies = vec![InvocationStrategy::PromptFlag];
        let adapter = create_adapter(&config).unwrap();
        assert_eq!(adapter.strategy_labels(), vec!["llama-cpp:promptFlag"]);
    }
}
