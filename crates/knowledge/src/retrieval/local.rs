//! In-memory index over a [`PassageStore`].

use std::collections::HashSet;

use super::fusion::{reciprocal_rank_fusion, RRF_K};
use super::trigram;
use super::Retriever;
use crate::store::PassageStore;
use veritas_core::{AppResult, Passage, SearchMode};

/// Minimum results fetched per leg before fusion.
const HYBRID_MIN_FETCH: usize = 5;

struct Entry {
    passage: Passage,
    vector: Vec<f32>,
    terms: HashSet<String>,
}

/// Reference retriever: trigram knn, optionally fused with term overlap.
///
/// Passages sharing nothing with the query are never returned.
pub struct LocalIndex {
    entries: Vec<Entry>,
}

impl std::fmt::Debug for LocalIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalIndex")
            .field("passages", &self.entries.len())
            .finish()
    }
}

impl LocalIndex {
    pub fn from_passages(passages: Vec<Passage>) -> Self {
        let entries = passages
            .into_iter()
            .map(|passage| Entry {
                vector: trigram::embed(&passage.text),
                terms: trigram::terms(&passage.text).into_iter().collect(),
                passage,
            })
            .collect();
        Self { entries }
    }

    /// Load every passage in `store`. A store that was never written is an
    /// empty index.
    pub fn open(store: &PassageStore) -> AppResult<Self> {
        if !store.exists() {
            tracing::warn!(dir = %store.dir().display(), "Passage store is empty, run `veritas ingest` first");
            return Ok(Self::from_passages(Vec::new()));
        }
        let index = Self::from_passages(store.list_passages()?);
        tracing::debug!(passages = index.len(), "Opened local index");
        Ok(index)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn knn(&self, query: &str, top_k: usize) -> Vec<Passage> {
        let query_vector = trigram::embed(query);
        rank(
            self.entries
                .iter()
                .map(|e| (e, trigram::cosine(&query_vector, &e.vector))),
            top_k,
        )
    }

    fn lexical(&self, query: &str, top_k: usize) -> Vec<Passage> {
        let query_terms: HashSet<String> = trigram::terms(query).into_iter().collect();
        rank(
            self.entries.iter().map(|e| {
                let overlap = query_terms.intersection(&e.terms).count();
                (e, overlap as f32)
            }),
            top_k,
        )
    }
}

/// Best `top_k` with a positive score, ties in store order.
fn rank<'a>(scored: impl Iterator<Item = (&'a Entry, f32)>, top_k: usize) -> Vec<Passage> {
    let mut hits: Vec<(usize, &Entry, f32)> = scored
        .enumerate()
        .filter(|(_, (_, score))| *score > 0.0)
        .map(|(i, (e, score))| (i, e, score))
        .collect();
    hits.sort_by(|a, b| b.2.total_cmp(&a.2).then(a.0.cmp(&b.0)));

    hits.into_iter()
        .take(top_k)
        .map(|(_, e, score)| Passage {
            score,
            ..e.passage.clone()
        })
        .collect()
}

#[async_trait::async_trait]
impl Retriever for LocalIndex {
    fn name(&self) -> &str {
        "local"
    }

    async fn search(&self, query: &str, top_k: usize, mode: SearchMode) -> AppResult<Vec<Passage>> {
        let results = match mode {
            SearchMode::Knn => self.knn(query, top_k),
            SearchMode::Hybrid => {
                let fetch = top_k.max(HYBRID_MIN_FETCH);
                let mut fused = reciprocal_rank_fusion(
                    vec![self.knn(query, fetch), self.lexical(query, fetch)],
                    RRF_K,
                );
                fused.truncate(top_k);
                fused
            }
        };

        tracing::debug!(
            mode = mode.as_str(),
            top_k,
            returned = results.len(),
            corpus = self.len(),
            "Local search"
        );
        Ok(results)
    }
}
