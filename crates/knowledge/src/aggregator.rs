//! Context aggregation: turns a ranked passage list into a bounded,
//! deduplicated [`Context`].
//!
//! Passages are taken in retrieval order and accepted whole or not at all.
//! A passage that does not fit is skipped and scanning continues, so a
//! smaller later passage can still use the remaining budget.

use sha2::{Digest, Sha256};
use std::collections::HashSet;

use veritas_core::{Context, Passage, RagConfig, TokenEstimator};

/// Floor for a derived token budget.
pub const MIN_DERIVED_BUDGET: usize = 128;

/// Per-request aggregation policy.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregationPolicy {
    pub token_budget_max: usize,
    pub min_citations: usize,
    /// 1.0 means exact match after whitespace normalization
    pub dedupe_threshold: f32,
    pub token_estimator: TokenEstimator,
    pub identity_field: String,
    /// Tokens charged per passage for its marker and separators
    pub per_passage_overhead: usize,
    pub min_score: Option<f32>,
    pub max_context_chars: Option<usize>,
}

impl Default for AggregationPolicy {
    fn default() -> Self {
        Self::from_config(&RagConfig::default(), 0)
    }
}

impl AggregationPolicy {
    fn from_config(rag: &RagConfig, token_budget_max: usize) -> Self {
        Self {
            token_budget_max,
            min_citations: rag.min_citations,
            dedupe_threshold: rag.dedupe_threshold,
            token_estimator: rag.token_estimator,
            identity_field: rag.identity_field.clone(),
            per_passage_overhead: rag.per_passage_overhead,
            min_score: rag.min_score,
            max_context_chars: Some(rag.max_context_chars),
        }
    }

    /// Policy for one request.
    ///
    /// Without a configured `tokenBudgetMax` the budget is whatever the model
    /// window leaves after the answer, the reserve and the question.
    pub fn for_request(
        rag: &RagConfig,
        answer_max_tokens: u32,
        question: &str,
        max_context_chars: Option<usize>,
    ) -> Self {
        let budget = rag.token_budget_max.unwrap_or_else(|| {
            rag.context_size
                .saturating_sub(answer_max_tokens as usize)
                .saturating_sub(rag.reserve_tokens)
                .saturating_sub(rag.token_estimator.estimate(question))
                .max(MIN_DERIVED_BUDGET)
        });

        let mut policy = Self::from_config(rag, budget);
        if let Some(chars) = max_context_chars {
            policy.max_context_chars = Some(chars);
        }
        policy
    }

    /// Token cost charged for one passage.
    pub fn cost(&self, passage: &Passage) -> usize {
        self.token_estimator.estimate(&passage.text) + self.per_passage_overhead
    }
}

/// Build a context from `passages` under `policy`. Never fails.
pub fn aggregate(passages: &[Passage], policy: &AggregationPolicy) -> Context {
    let mut context = Context::empty(policy.token_budget_max, policy.min_citations);
    let mut dedupe = DedupeIndex::new(policy.dedupe_threshold);

    let mut skipped_blank = 0usize;
    let mut skipped_score = 0usize;
    let mut skipped_duplicate = 0usize;
    let mut skipped_budget = 0usize;

    for passage in passages {
        let normalized = normalize_whitespace(&passage.text);
        if normalized.is_empty() {
            skipped_blank += 1;
            continue;
        }

        if let Some(floor) = policy.min_score {
            if passage.score < floor {
                skipped_score += 1;
                continue;
            }
        }

        let identity = passage.identity(&policy.identity_field);
        if dedupe.is_duplicate(identity, &normalized) {
            skipped_duplicate += 1;
            continue;
        }

        let cost = policy.cost(passage);
        if context.token_budget_used + cost > context.token_budget_max {
            skipped_budget += 1;
            continue;
        }

        let chars = passage.text.chars().count();
        if let Some(cap) = policy.max_context_chars {
            if context.chars_used + chars > cap {
                skipped_budget += 1;
                continue;
            }
        }

        dedupe.insert(identity, normalized);
        context.token_budget_used += cost;
        context.chars_used += chars;
        context.passages.push(passage.clone());
    }

    context.under_cited = context.len() < policy.min_citations;

    tracing::debug!(
        candidates = passages.len(),
        accepted = context.len(),
        skipped_blank,
        skipped_score,
        skipped_duplicate,
        skipped_budget,
        tokens_used = context.token_budget_used,
        tokens_max = context.token_budget_max,
        chars_used = context.chars_used,
        under_cited = context.under_cited,
        "Aggregated context"
    );

    context
}

/// Collapse whitespace runs to one space and trim.
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Hex SHA-256 of identity and normalized text.
pub fn dedupe_key(identity: &str, normalized: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(identity.as_bytes());
    hasher.update([0x1f]);
    hasher.update(normalized.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Accepted passages, as seen by the dedupe rule.
struct DedupeIndex {
    threshold: f32,
    keys: HashSet<String>,
    accepted: Vec<(String, String)>,
}

impl DedupeIndex {
    fn new(threshold: f32) -> Self {
        Self {
            threshold,
            keys: HashSet::new(),
            accepted: Vec::new(),
        }
    }

    fn is_exact(&self) -> bool {
        self.threshold >= 1.0
    }

    fn is_duplicate(&self, identity: &str, normalized: &str) -> bool {
        if self.keys.contains(&dedupe_key(identity, normalized)) {
            return true;
        }
        if self.is_exact() {
            return false;
        }
        self.accepted
            .iter()
            .filter(|(id, _)| id == identity)
            .any(|(_, text)| prefix_similarity(text, normalized) >= self.threshold)
    }

    fn insert(&mut self, identity: &str, normalized: String) {
        self.keys.insert(dedupe_key(identity, &normalized));
        if !self.is_exact() {
            self.accepted.push((identity.to_string(), normalized));
        }
    }
}

/// Share of the longer text covered by the common prefix, in chars.
fn prefix_similarity(a: &str, b: &str) -> f32 {
    let longer = a.chars().count().max(b.chars().count());
    if longer == 0 {
        return 1.0;
    }
    let common = a.chars().zip(b.chars()).take_while(|(x, y)| x == y).count();
    common as f32 / longer as f32
}
