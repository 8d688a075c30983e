//! Cross-module scenarios: retrieval through answer assembly with scripted
//! collaborators.


use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::rag::RagPipeline;
use crate::retrieval::Retriever;
use veritas_core::{AppError, AppResult, Passage, RagConfig, RetrievalConfig, SearchMode};
use veritas_llm::{GenerationAdapter, LlmClient, LlmRequest, LlmResponse, LlmUsage};
use veritas_prompt::PromptBuilder;

/// Generation timeout used by scenario pipelines.
pub(crate) const TEST_TIMEOUT: Duration = Duration::from_millis(150);

/// Returns canned passages per question, or fails.
pub(crate) struct MapRetriever {
    answers: HashMap<String, Vec<Passage>>,
    fail: bool,
    calls: AtomicUsize,
}

impl MapRetriever {
    pub(crate) fn new() -> Self {
        Self {
            answers: HashMap::new(),
            fail: false,
            calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new()
        }
    }

    pub(crate) fn with(mut self, question: &str, passages: Vec<Passage>) -> Self {
        self.answers.insert(question.to_string(), passages);
        self
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl Retriever for MapRetriever {
    fn name(&self) -> &str {
        "map"
    }

    async fn search(&self, query: &str, top_k: usize, _mode: SearchMode) -> AppResult<Vec<Passage>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(AppError::Other("connection refused".to_string()));
        }
        Ok(self
            .answers
            .get(query)
            .map(|p| p.iter().take(top_k).cloned().collect())
            .unwrap_or_default())
    }
}

/// One scripted backend reaction.
pub(crate) enum Step {
    Reply(&'static str),
    Hang,
    Fail,
}

/// Sets its flag when dropped.
struct DropFlag(Arc<AtomicBool>);

impl Drop for DropFlag {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

/// Backend that plays a script and records every prompt it receives.
pub(crate) struct ScriptedClient {
    label: &'static str,
    script: Mutex<VecDeque<Step>>,
    prompts: Mutex<Vec<String>>,
    max_tokens: Mutex<Vec<u32>>,
    cancelled: Arc<AtomicBool>,
}

impl ScriptedClient {
    pub(crate) fn new(label: &'static str, script: Vec<Step>) -> Arc<Self> {
        Arc::new(Self {
            label,
            script: Mutex::new(script.into()),
            prompts: Mutex::new(Vec::new()),
            max_tokens: Mutex::new(Vec::new()),
            cancelled: Arc::new(AtomicBool::new(false)),
        })
    }

    pub(crate) fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    /// Answer-token limits received, one per call.
    pub(crate) fn max_tokens(&self) -> Vec<u32> {
        self.max_tokens.lock().unwrap().clone()
    }

    pub(crate) fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    /// Whether a hanging call was dropped before finishing.
    pub(crate) fn was_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl LlmClient for ScriptedClient {
    fn provider_name(&self) -> &str {
        "scripted"
    }

    fn strategy(&self) -> Option<&str> {
        Some(self.label)
    }

    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
        self.prompts.lock().unwrap().push(request.prompt.clone());
        self.max_tokens.lock().unwrap().push(request.max_tokens);
        let step = self.script.lock().unwrap().pop_front().unwrap_or(Step::Fail);

        match step {
            Step::Reply(text) => Ok(LlmResponse {
                content: text.to_string(),
                provider: "scripted".to_string(),
                strategy: Some(self.label.to_string()),
                usage: LlmUsage::default(),
            }),
            Step::Hang => {
                let _guard = DropFlag(self.cancelled.clone());
                std::future::pending::<()>().await;
                unreachable!()
            }
            Step::Fail => Err(AppError::GenerationFailed("exit status 1".to_string())),
        }
    }
}

pub(crate) fn adapter(chain: Vec<Arc<ScriptedClient>>) -> GenerationAdapter {
    let chain: Vec<Arc<dyn LlmClient>> = chain
        .into_iter()
        .map(|c| c as Arc<dyn LlmClient>)
        .collect();
    GenerationAdapter::new(chain, 1, TEST_TIMEOUT)
}

pub(crate) fn pipeline(
    retriever: Arc<dyn Retriever>,
    chain: Vec<Arc<ScriptedClient>>,
    rag: RagConfig,
) -> RagPipeline {
    RagPipeline::new(
        retriever,
        adapter(chain),
        PromptBuilder::new(),
        rag,
        RetrievalConfig::default(),
    )
}

pub(crate) fn t1477() -> Passage {
    Passage::new("T1477", "Permission misuse...", 12.3)
        .with_meta("url", "https://attack.mitre.org/techniques/T1477")
        .with_meta("source_id", "T1477")
}
