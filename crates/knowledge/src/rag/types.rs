//! RAG request and response types.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use veritas_core::{ManifestEntry, SearchMode};

/// A question for the pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AskRequest {
    pub question: String,

    /// Passages to retrieve; the configured default when absent
    #[serde(default)]
    pub top_k: Option<usize>,

    /// Upper bound on generated tokens, clamped to the configured range
    #[serde(default)]
    pub answer_max_tokens: Option<u32>,

    /// Legacy name for `answer_max_tokens`
    #[serde(default)]
    pub max_tokens: Option<u32>,

    /// Style preset name; unknown names fall back to `base`
    #[serde(default)]
    pub style: Option<String>,

    #[serde(default)]
    pub search_mode: Option<SearchMode>,

    #[serde(default)]
    pub max_context_chars: Option<usize>,
}

impl AskRequest {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            ..Default::default()
        }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = Some(top_k);
        self
    }

    pub fn with_style(mut self, style: impl Into<String>) -> Self {
        self.style = Some(style.into());
        self
    }

    pub fn with_answer_max_tokens(mut self, tokens: u32) -> Self {
        self.answer_max_tokens = Some(tokens);
        self
    }

    /// Requested answer length, preferring the current field name.
    pub fn requested_answer_tokens(&self) -> Option<u32> {
        self.answer_max_tokens.or(self.max_tokens)
    }
}

/// A passage the answer actually cites.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    /// Marker number as it appeared in the prompt
    pub marker: usize,
    pub id: String,
    pub score: f32,
    pub text: String,
    pub meta: BTreeMap<String, String>,
}

impl Citation {
    pub fn from_entry(entry: &ManifestEntry) -> Self {
        Self {
            marker: entry.marker,
            id: entry.passage.id.clone(),
            score: entry.passage.score,
            text: entry.passage.text.clone(),
            meta: entry.passage.metadata.clone(),
        }
    }
}

/// Non-fatal findings carried in the response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnswerWarning {
    /// Fewer passages reached the context than required
    UnderCited { accepted: usize, required: usize },

    /// The answer used a marker that is not in the context
    CitationIntegrity { marker: String },

    /// The context had passages but the answer cites none of them
    NoCitationsUsed,
}

/// Answer with its audit trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AskResponse {
    pub answer: String,
    pub citations: Vec<Citation>,

    /// Only filled by the `json` preset
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bullets: Vec<String>,

    pub under_cited: bool,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<AnswerWarning>,

    /// Preset actually used
    pub style: String,

    pub request_id: String,
}
