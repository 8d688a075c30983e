//! RAG answering orchestration.
//!
//! One [`RagPipeline::ask`] call is one request: retrieve, aggregate, build
//! the prompt, generate, assemble. Nothing computed for a request outlives it.

use std::sync::Arc;
use std::time::Duration;
use tracing::Instrument;

use crate::aggregator::{aggregate, AggregationPolicy};
use crate::assembler::AnswerAssembler;
use crate::rag::types::{AnswerWarning, AskRequest, AskResponse};
use crate::retrieval::{LocalIndex, Retriever};
use crate::store::PassageStore;
use veritas_core::{AppConfig, AppError, AppResult, Passage, RagConfig, RetrievalConfig, SearchMode};
use veritas_llm::{create_adapter, GenerationAdapter};
use veritas_prompt::{load_overrides, PromptBuilder, StylePreset};

/// Retrieval, aggregation, generation and assembly wired together.
///
/// Shared read-only between concurrent requests. Generation is bounded by
/// the adapter's permit pool.
pub struct RagPipeline {
    retriever: Arc<dyn Retriever>,
    generator: GenerationAdapter,
    prompts: PromptBuilder,
    assembler: AnswerAssembler,
    rag: RagConfig,
    retrieval: RetrievalConfig,
}

impl std::fmt::Debug for RagPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RagPipeline")
            .field("retriever", &self.retriever.name())
            .field("generator", &self.generator)
            .field("retrieval", &self.retrieval)
            .finish()
    }
}

impl RagPipeline {
    pub fn new(
        retriever: Arc<dyn Retriever>,
        generator: GenerationAdapter,
        prompts: PromptBuilder,
        rag: RagConfig,
        retrieval: RetrievalConfig,
    ) -> Self {
        Self {
            retriever,
            generator,
            prompts,
            assembler: AnswerAssembler::from_config(&rag),
            rag,
            retrieval,
        }
    }

    /// Pipeline over the workspace's local index and configured backend.
    ///
    /// Backend discovery and preset overrides are resolved here, once.
    pub fn from_config(config: &AppConfig) -> AppResult<Self> {
        config.validate()?;

        let store = PassageStore::new(config.index_dir());
        let retriever: Arc<dyn Retriever> = Arc::new(LocalIndex::open(&store)?);
        let generator = create_adapter(&config.generation)?;

        let prompts_dir = config
            .prompts_dir()
            .unwrap_or_else(|| config.veritas_dir().join("prompts"));
        let overrides = load_overrides(&prompts_dir)?;

        tracing::info!(
            retriever = retriever.name(),
            strategies = ?generator.strategy_labels(),
            overrides = overrides.len(),
            "RAG pipeline ready"
        );

        Ok(Self::new(
            retriever,
            generator,
            PromptBuilder::with_overrides(overrides),
            config.rag.clone(),
            config.retrieval.clone(),
        ))
    }

    pub fn generator(&self) -> &GenerationAdapter {
        &self.generator
    }

    /// Answer one question.
    ///
    /// Dropping the returned future cancels the request, including a running
    /// backend process.
    pub async fn ask(&self, request: AskRequest) -> AppResult<AskResponse> {
        let request_id = uuid::Uuid::new_v4().to_string();
        let span = tracing::info_span!("rag_request", request_id = %request_id);
        self.run(request, request_id).instrument(span).await
    }

    async fn run(&self, request: AskRequest, request_id: String) -> AppResult<AskResponse> {
        let question = request.question.trim();
        if question.is_empty() {
            return Err(AppError::InvalidConfiguration(
                "question cannot be empty".to_string(),
            ));
        }

        let top_k = request.top_k.unwrap_or(self.retrieval.top_k);
        if top_k == 0 {
            return Err(AppError::InvalidConfiguration(
                "top_k must be at least 1".to_string(),
            ));
        }

        let answer_tokens = self.rag.clamp_answer_tokens(request.requested_answer_tokens());
        let preset = StylePreset::parse_or_base(request.style.as_deref());
        let mode = request.search_mode.unwrap_or(self.retrieval.mode);
        let policy =
            AggregationPolicy::for_request(&self.rag, answer_tokens, question, request.max_context_chars);

        tracing::info!(
            top_k,
            mode = mode.as_str(),
            preset = %preset,
            answer_tokens,
            token_budget = policy.token_budget_max,
            "Answering question"
        );

        let passages = self.retrieve(question, top_k, mode).await?;
        let context = aggregate(&passages, &policy);
        let manifest = context.manifest();

        let mut warnings = Vec::new();
        if context.under_cited {
            warnings.push(AnswerWarning::UnderCited {
                accepted: context.len(),
                required: context.min_citations,
            });
        }

        if context.under_cited && self.rag.short_circuit_on_empty {
            tracing::info!(accepted = context.len(), "Under-cited context, skipping generation");
            return Ok(AskResponse {
                answer: self.assembler.fallback_answer().to_string(),
                citations: Vec::new(),
                bullets: Vec::new(),
                under_cited: true,
                warnings,
                style: preset.as_str().to_string(),
                request_id,
            });
        }

        let prompt = self.prompts.build(&context, question, preset);
        let generated = self.generator.generate(&prompt.text, answer_tokens).await?;
        let assembled = self.assembler.assemble(&generated.content, &manifest, preset)?;
        warnings.extend(assembled.warnings);

        tracing::info!(
            provider = %generated.provider,
            strategy = generated.strategy.as_deref().unwrap_or("-"),
            passages = context.len(),
            citations = assembled.citations.len(),
            warnings = warnings.len(),
            "Answer assembled"
        );

        Ok(AskResponse {
            answer: assembled.answer,
            citations: assembled.citations,
            bullets: assembled.bullets,
            under_cited: context.under_cited,
            warnings,
            style: preset.as_str().to_string(),
            request_id,
        })
    }

    /// Search under the retrieval timeout. Every failure is `RetrievalUnavailable`.
    async fn retrieve(&self, question: &str, top_k: usize, mode: SearchMode) -> AppResult<Vec<Passage>> {
        let timeout = Duration::from_secs(self.retrieval.timeout_secs);
        match tokio::time::timeout(timeout, self.retriever.search(question, top_k, mode)).await {
            Ok(Ok(passages)) => {
                tracing::debug!(retrieved = passages.len(), "Retrieved passages");
                Ok(passages)
            }
            Ok(Err(AppError::RetrievalUnavailable(msg))) => Err(AppError::RetrievalUnavailable(msg)),
            Ok(Err(e)) => Err(AppError::RetrievalUnavailable(format!(
                "{} failed: {}",
                self.retriever.name(),
                e
            ))),
            Err(_) => Err(AppError::RetrievalUnavailable(format!(
                "{} did not answer within {}s",
                self.retriever.name(),
                self.retrieval.timeout_secs
            ))),
        }
    }
}
