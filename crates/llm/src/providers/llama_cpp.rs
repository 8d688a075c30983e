//! llama.cpp subprocess backend.
//!
//! Every request spawns the resolved binary once. The child is spawned with
//! `kill_on_drop`, so a timeout or a dropped request terminates it.

use std::path::PathBuf;
use std::process::Stdio;

use tokio::process::Command;
use veritas_core::{AppError, AppResult, InvocationStrategy};

use crate::client::{LlmClient, LlmRequest, LlmResponse, LlmUsage};

/// Longest stderr tail carried into an error message.
const STDERR_TAIL: usize = 600;

/// Settings shared by every strategy of one resolved binary.
#[derive(Debug, Clone)]
pub struct LlamaCppSettings {
    pub binary: PathBuf,
    pub model: PathBuf,
    pub gpu_layers: String,
    pub threads: Option<u32>,
    pub extra_args: Vec<String>,
}

/// One llama.cpp invocation strategy.
pub struct LlamaCppClient {
    settings: LlamaCppSettings,
    strategy: InvocationStrategy,
}

impl LlamaCppClient {
    pub fn new(settings: LlamaCppSettings, strategy: InvocationStrategy) -> Self {
        Self { settings, strategy }
    }

    fn build_args(&self, request: &LlmRequest) -> Vec<String> {
        let s = &self.settings;
        let mut args = vec![
            "-m".to_string(),
            s.model.display().to_string(),
            "-n".to_string(),
            request.max_tokens.to_string(),
            "-ngl".to_string(),
            s.gpu_layers.clone(),
        ];
        if let Some(threads) = s.threads {
            args.push("-t".to_string());
            args.push(threads.to_string());
        }
        args.extend(s.extra_args.iter().cloned());
        match self.strategy {
            InvocationStrategy::PromptFlag => {
                args.push("-p".to_string());
                args.push(request.prompt.clone());
            }
            InvocationStrategy::Positional => args.push(request.prompt.clone()),
        }
        args
    }
}

/// Trim the output and drop the prompt when the binary echoes it back.
fn clean_output(stdout: &str, prompt: &str) -> String {
    let text = stdout.trim();
    let prompt = prompt.trim();
    if !prompt.is_empty() {
        if let Some(rest) = text.strip_prefix(prompt) {
            return rest.trim().to_string();
        }
    }
    text.to_string()
}

fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let text = text.trim();
    let start = text
        .char_indices()
        .rev()
        .nth(STDERR_TAIL)
        .map(|(i, _)| i)
        .unwrap_or(0);
    text[start..].to_string()
}

#[async_trait::async_trait]
impl LlmClient for LlamaCppClient {
    fn provider_name(&self) -> &str {
        "llama-cpp"
    }

    fn strategy(&self) -> Option<&str> {
        Some(self.strategy.as_str())
    }

    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
        let args = self.build_args(request);

        tracing::debug!(
            binary = %self.settings.binary.display(),
            strategy = self.strategy.as_str(),
            max_tokens = request.max_tokens,
            prompt_chars = request.prompt.len(),
            "Spawning llama.cpp"
        );

        let output = Command::new(&self.settings.binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound | std::io::ErrorKind::PermissionDenied => {
                    AppError::BackendUnavailable(format!(
                        "Cannot execute {}: {}",
                        self.settings.binary.display(),
                        e
                    ))
                }
                _ => AppError::GenerationFailed(format!("Failed to run llama.cpp: {}", e)),
            })?;

        if !output.status.success() {
            let code = output.status.code().unwrap_or(-1);
            tracing::warn!(exit_code = code, strategy = self.strategy.as_str(), "llama.cpp exited with an error");
            return Err(AppError::GenerationFailed(format!(
                "llama.cpp exited with code {}: {}",
                code,
                stderr_tail(&output.stderr)
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let content = clean_output(&stdout, &request.prompt);

        Ok(LlmResponse {
            content,
            provider: self.provider_name().to_string(),
            strategy: Some(self.strategy.as_str().to_string()),
            usage: LlmUsage::default(),
        })
    }
}
