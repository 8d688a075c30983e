//! Configuration management for Veritas.
//!
//! Configuration is layered, later layers winning:
//! - Built-in defaults
//! - Config file (`.veritas/config.yaml` or `--config` / `VERITAS_CONFIG`)
//! - Environment variables
//! - Command-line flags
//!
//! Everything the pipeline reads from here is treated as immutable per request.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult};
use crate::passage::SearchMode;
use crate::tokens::TokenEstimator;

/// Backends the generation adapter knows how to drive.
pub const KNOWN_BACKENDS: [&str; 2] = ["llama-cpp", "ollama"];

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the workspace root (contains .veritas/)
    pub workspace: PathBuf,

    /// Optional config file path
    pub config_file: Option<PathBuf>,

    /// Log level override
    pub log_level: Option<String>,

    /// Verbose mode (enables debug logging)
    pub verbose: bool,

    /// Disable colored output
    pub no_color: bool,

    pub rag: RagConfig,
    pub generation: GenerationConfig,
    pub retrieval: RetrievalConfig,
}

/// Aggregation, prompting and assembly policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RagConfig {
    /// Explicit context token budget. Derived from `context_size` when absent.
    pub token_budget_max: Option<usize>,
    pub context_size: usize,
    pub reserve_tokens: usize,
    pub min_citations: usize,
    /// 1.0 means exact match after whitespace normalization.
    pub dedupe_threshold: f32,
    pub identity_field: String,
    pub token_estimator: TokenEstimator,
    pub per_passage_overhead: usize,
    pub min_score: Option<f32>,
    pub max_context_chars: usize,
    pub short_circuit_on_empty: bool,
    pub fallback_answer: String,
    pub refusal_patterns: Vec<String>,
    pub default_answer_max_tokens: u32,
    pub answer_max_tokens_range: [u32; 2],
    pub prompts_dir: Option<PathBuf>,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            token_budget_max: None,
            context_size: 4096,
            reserve_tokens: 64,
            min_citations: 1,
            dedupe_threshold: 1.0,
            identity_field: "source_id".to_string(),
            token_estimator: TokenEstimator::default(),
            per_passage_overhead: 8,
            min_score: None,
            max_context_chars: 16_000,
            short_circuit_on_empty: false,
            fallback_answer: "not found in context".to_string(),
            refusal_patterns: vec![
                "not found in context".to_string(),
                "could not find".to_string(),
                "não encontrei".to_string(),
            ],
            default_answer_max_tokens: 400,
            answer_max_tokens_range: [64, 2000],
            prompts_dir: None,
        }
    }
}

impl RagConfig {
    /// Resolve a requested answer length: missing takes the default, then clamp.
    pub fn clamp_answer_tokens(&self, requested: Option<u32>) -> u32 {
        let [lo, hi] = self.answer_max_tokens_range;
        requested
            .unwrap_or(self.default_answer_max_tokens)
            .clamp(lo, hi)
    }
}

/// How the prompt is handed to a subprocess backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum InvocationStrategy {
    /// `-p <prompt>`
    PromptFlag,
    /// prompt as the last positional argument
    Positional,
}

impl InvocationStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvocationStrategy::PromptFlag => "promptFlag",
            InvocationStrategy::Positional => "positional",
        }
    }
}

/// Generation backend settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GenerationConfig {
    pub backend: String,
    pub binary: Option<PathBuf>,
    pub binary_candidates: Vec<PathBuf>,
    pub model_path: Option<PathBuf>,
    pub model_search_dirs: Vec<PathBuf>,
    pub gpu_layers: String,
    pub threads: Option<u32>,
    pub extra_args: Vec<String>,
    /// Ordered fallback strategies. Empty means derive from the binary name.
    pub strategies: Vec<InvocationStrategy>,
    pub timeout_secs: u64,
    pub warmup_timeout_secs: u64,
    pub max_concurrency: usize,
    pub ollama_endpoint: String,
    pub ollama_model: String,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            backend: "llama-cpp".to_string(),
            binary: None,
            binary_candidates: vec![
                PathBuf::from("/app/llama.cpp/build/bin/llama-cli"),
                PathBuf::from("/app/llama.cpp/build/bin/llama-simple"),
                PathBuf::from("/app/llama.cpp/build/bin/main"),
            ],
            model_path: None,
            model_search_dirs: vec![PathBuf::from("/models")],
            gpu_layers: "0".to_string(),
            threads: None,
            extra_args: Vec::new(),
            strategies: Vec::new(),
            timeout_secs: 120,
            warmup_timeout_secs: 900,
            max_concurrency: 1,
            ollama_endpoint: "http://localhost:11434".to_string(),
            ollama_model: "llama3.2".to_string(),
        }
    }
}

/// Retriever settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RetrievalConfig {
    pub top_k: usize,
    pub mode: SearchMode,
    pub timeout_secs: u64,
    pub index_name: String,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 3,
            mode: SearchMode::Knn,
            timeout_secs: 15,
            index_name: "default".to_string(),
        }
    }
}

/// Full configuration file structure.
#[derive(Debug, Clone, Default, Deserialize)]
struct ConfigFile {
    workspace: Option<WorkspaceConfig>,
    logging: Option<LoggingConfig>,
    rag: Option<RagConfig>,
    generation: Option<GenerationConfig>,
    retrieval: Option<RetrievalConfig>,
}

#[derive(Debug, Clone, Deserialize)]
struct WorkspaceConfig {
    path: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct LoggingConfig {
    level: Option<String>,
    color: Option<bool>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            workspace: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            config_file: None,
            log_level: None,
            verbose: false,
            no_color: false,
            rag: RagConfig::default(),
            generation: GenerationConfig::default(),
            retrieval: RetrievalConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from defaults, the config file and the environment.
    ///
    /// Environment variables:
    /// - `VERITAS_WORKSPACE`: Override workspace path
    /// - `VERITAS_CONFIG`: Path to config file
    /// - `VERITAS_BACKEND`: Generation backend (`llama-cpp` or `ollama`)
    /// - `LLAMA_CPP_PATH`: llama.cpp binary or directory
    /// - `MODEL_PATH`: GGUF model file
    /// - `OLLAMA_HOST`: Ollama endpoint
    /// - `RUST_LOG`: Log level
    /// - `NO_COLOR`: Disable colored output
    pub fn load() -> AppResult<Self> {
        Self::load_with(None, None)
    }

    /// Like [`AppConfig::load`], with explicit workspace and config file paths
    /// taking precedence over the environment.
    pub fn load_with(workspace: Option<PathBuf>, config_file: Option<PathBuf>) -> AppResult<Self> {
        let mut config = Self::default();

        if let Some(workspace) = workspace.or_else(|| env_path("VERITAS_WORKSPACE")) {
            config.workspace = workspace;
        }
        config.config_file = config_file.or_else(|| env_path("VERITAS_CONFIG"));

        if !config.workspace.exists() {
            return Err(AppError::InvalidConfiguration(format!(
                "Workspace directory does not exist: {:?}",
                config.workspace
            )));
        }

        let config_path = config
            .config_file
            .clone()
            .unwrap_or_else(|| config.veritas_dir().join("config.yaml"));

        if config_path.exists() {
            config = config.merge_yaml(&config_path)?;
        } else if config.config_file.is_some() {
            return Err(AppError::InvalidConfiguration(format!(
                "Config file not found: {:?}",
                config_path
            )));
        }

        config.apply_env();
        Ok(config)
    }

    fn apply_env(&mut self) {
        if let Ok(backend) = std::env::var("VERITAS_BACKEND") {
            self.generation.backend = backend;
        }
        if let Some(binary) = env_path("LLAMA_CPP_PATH") {
            self.generation.binary = Some(binary);
        }
        if let Some(model) = env_path("MODEL_PATH") {
            self.generation.model_path = Some(model);
        }
        if let Ok(host) = std::env::var("OLLAMA_HOST") {
            self.generation.ollama_endpoint = host;
        }
        if let Ok(level) = std::env::var("RUST_LOG") {
            self.log_level = Some(level);
        }
        if std::env::var_os("NO_COLOR").is_some() {
            self.no_color = true;
        }
    }

    /// Merge YAML configuration file into this config.
    fn merge_yaml(&self, path: &Path) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::InvalidConfiguration(format!(
                "Failed to read config file {:?}: {}",
                path, e
            ))
        })?;

        let config_file: ConfigFile = if contents.trim().is_empty() {
            ConfigFile::default()
        } else {
            serde_yaml::from_str(&contents).map_err(|e| {
                AppError::InvalidConfiguration(format!(
                    "Failed to parse config file {:?}: {}",
                    path, e
                ))
            })?
        };

        let mut result = self.clone();

        if let Some(path) = config_file.workspace.and_then(|ws| ws.path) {
            result.workspace = PathBuf::from(path);
        }

        if let Some(logging) = config_file.logging {
            if let Some(level) = logging.level {
                result.log_level = Some(level);
            }
            if let Some(color) = logging.color {
                result.no_color = !color;
            }
        }

        if let Some(rag) = config_file.rag {
            result.rag = rag;
        }
        if let Some(generation) = config_file.generation {
            result.generation = generation;
        }
        if let Some(retrieval) = config_file.retrieval {
            result.retrieval = retrieval;
        }

        Ok(result)
    }

    /// Apply CLI overrides to the configuration.
    pub fn with_overrides(
        mut self,
        backend: Option<String>,
        log_level: Option<String>,
        verbose: bool,
        no_color: bool,
    ) -> Self {
        if let Some(backend) = backend {
            self.generation.backend = backend;
        }

        if let Some(log_level) = log_level {
            self.log_level = Some(log_level);
        }

        if verbose {
            self.verbose = true;
            if self.log_level.is_none() {
                self.log_level = Some("debug".to_string());
            }
        }

        if no_color {
            self.no_color = true;
        }

        self
    }

    /// Get the path to the .veritas directory.
    pub fn veritas_dir(&self) -> PathBuf {
        self.workspace.join(".veritas")
    }

    /// Ensure the .veritas directory exists.
    pub fn ensure_veritas_dir(&self) -> AppResult<()> {
        let dir = self.veritas_dir();
        if !dir.exists() {
            std::fs::create_dir_all(&dir).map_err(|e| {
                AppError::InvalidConfiguration(format!(
                    "Failed to create .veritas directory: {}",
                    e
                ))
            })?;
        }
        Ok(())
    }

    /// Directory holding the local passage store for the configured index.
    pub fn index_dir(&self) -> PathBuf {
        self.veritas_dir()
            .join("index")
            .join(&self.retrieval.index_name)
    }

    /// Preset override directory, resolved against the workspace.
    pub fn prompts_dir(&self) -> Option<PathBuf> {
        self.rag.prompts_dir.as_ref().map(|dir| {
            if dir.is_absolute() {
                dir.clone()
            } else {
                self.workspace.join(dir)
            }
        })
    }

    /// Reject values that would make the pipeline misbehave.
    pub fn validate(&self) -> AppResult<()> {
        let backend = self.generation.backend.as_str();
        if !KNOWN_BACKENDS.contains(&backend) {
            return Err(AppError::InvalidConfiguration(format!(
                "Unknown backend: {}. Supported: {}",
                backend,
                KNOWN_BACKENDS.join(", ")
            )));
        }

        if self.generation.max_concurrency == 0 {
            return Err(AppError::InvalidConfiguration(
                "generation.maxConcurrency must be at least 1".to_string(),
            ));
        }

        if self.generation.timeout_secs == 0 || self.generation.warmup_timeout_secs == 0 {
            return Err(AppError::InvalidConfiguration(
                "generation timeouts must be positive".to_string(),
            ));
        }

        let threshold = self.rag.dedupe_threshold;
        if !(threshold > 0.0 && threshold <= 1.0) {
            return Err(AppError::InvalidConfiguration(format!(
                "rag.dedupeThreshold must be in (0, 1], got {}",
                threshold
            )));
        }

        let [lo, hi] = self.rag.answer_max_tokens_range;
        if lo == 0 || lo > hi {
            return Err(AppError::InvalidConfiguration(format!(
                "rag.answerMaxTokensRange is invalid: [{}, {}]",
                lo, hi
            )));
        }

        let param = self.rag.token_estimator.parameter();
        if !(param.is_finite() && param > 0.0) {
            return Err(AppError::InvalidConfiguration(format!(
                "rag.tokenEstimator parameter must be positive, got {}",
                param
            )));
        }

        if self.rag.context_size == 0 {
            return Err(AppError::InvalidConfiguration(
                "rag.contextSize must be positive".to_string(),
            ));
        }

        if self.retrieval.timeout_secs == 0 {
            return Err(AppError::InvalidConfiguration(
                "retrieval.timeoutSecs must be positive".to_string(),
            ));
        }

        Ok(())
    }
}

fn env_path(name: &str) -> Option<PathBuf> {
    std::env::var_os(name)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}
