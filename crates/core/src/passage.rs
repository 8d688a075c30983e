//! Request-scoped data model shared by retrieval, aggregation, prompting and
//! answer assembly.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{AppError, AppResult};

/// Metadata keys consulted, in order, when a passage is shown with a source line.
pub const SOURCE_KEYS: [&str; 3] = ["url", "source", "source_id"];

/// A scored retrieval result.
///
/// `score` only orders passages within the retrieval call that produced them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Passage {
    pub id: String,
    pub text: String,
    pub score: f32,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl Passage {
    pub fn new(id: impl Into<String>, text: impl Into<String>, score: f32) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            score,
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Value used to group duplicates: the identity field when present, the id otherwise.
    pub fn identity<'a>(&'a self, identity_field: &str) -> &'a str {
        self.metadata
            .get(identity_field)
            .map(String::as_str)
            .unwrap_or(&self.id)
    }

    /// Human-facing provenance: url, source, source_id, then the passage id.
    pub fn source_label(&self) -> &str {
        SOURCE_KEYS
            .iter()
            .find_map(|k| self.metadata.get(*k).filter(|v| !v.is_empty()))
            .map(String::as_str)
            .unwrap_or(&self.id)
    }
}

/// Retrieval strategy requested from a retriever.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    #[default]
    Knn,
    Hybrid,
}

impl SearchMode {
    pub fn parse(s: &str) -> AppResult<Self> {
        match s.trim().to_lowercase().as_str() {
            "knn" => Ok(SearchMode::Knn),
            "hybrid" => Ok(SearchMode::Hybrid),
            other => Err(AppError::InvalidConfiguration(format!(
                "Unknown search mode: {}. Supported: knn, hybrid",
                other
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SearchMode::Knn => "knn",
            SearchMode::Hybrid => "hybrid",
        }
    }
}

/// Bounded, ordered selection of passages. Position `i` carries marker `[i + 1]`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Context {
    pub passages: Vec<Passage>,
    pub token_budget_used: usize,
    pub token_budget_max: usize,
    pub chars_used: usize,
    pub min_citations: usize,
    pub under_cited: bool,
}

impl Context {
    /// An empty context for the given budget.
    pub fn empty(token_budget_max: usize, min_citations: usize) -> Self {
        Self {
            token_budget_max,
            min_citations,
            under_cited: min_citations > 0,
            ..Default::default()
        }
    }

    pub fn len(&self) -> usize {
        self.passages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.passages.is_empty()
    }

    /// Freeze the marker assignment for prompting and answer assembly.
    pub fn manifest(&self) -> CitationManifest {
        CitationManifest {
            entries: self
                .passages
                .iter()
                .enumerate()
                .map(|(i, p)| ManifestEntry {
                    marker: i + 1,
                    passage: p.clone(),
                })
                .collect(),
        }
    }
}

/// One marker binding.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ManifestEntry {
    pub marker: usize,
    pub passage: Passage,
}

/// Marker to passage mapping for one request. Read-only once built.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CitationManifest {
    entries: Vec<ManifestEntry>,
}

impl CitationManifest {
    pub fn get(&self, marker: usize) -> Option<&ManifestEntry> {
        marker
            .checked_sub(1)
            .and_then(|idx| self.entries.get(idx))
    }

    pub fn contains(&self, marker: usize) -> bool {
        self.get(marker).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ManifestEntry> {
        self.entries.iter()
    }
}
