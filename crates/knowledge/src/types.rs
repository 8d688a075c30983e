//! Ingestion and store type definitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One document offered for ingestion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestDoc {
    /// Document identifier; `metadata.attack_id` or a generated id when absent
    #[serde(default)]
    pub id: Option<String>,

    pub text: String,

    /// Free-form metadata; non-string values are stored as JSON text
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

/// Ingestion request: plain texts and/or documents with metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestRequest {
    /// Plain texts, indexed as single passages without metadata
    #[serde(default)]
    pub texts: Vec<String>,

    #[serde(default)]
    pub docs: Vec<IngestDoc>,

    /// Span length in characters
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Characters shared by consecutive spans
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
}

pub fn default_chunk_size() -> usize {
    800
}

pub fn default_chunk_overlap() -> usize {
    100
}

impl Default for IngestRequest {
    fn default() -> Self {
        Self {
            texts: Vec::new(),
            docs: Vec::new(),
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
        }
    }
}

/// Statistics from an ingest operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestStats {
    pub received_texts: usize,
    pub received_docs: usize,

    /// Documents and texts that produced at least one passage
    pub sources_count: usize,

    pub passages_count: usize,

    pub duration_secs: f64,
}

/// Represents an ingested document (sources.jsonl tracking).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRecord {
    /// Identity used for deduplication (`source_id` metadata of its passages)
    pub source_id: String,

    /// Document id used as passage id prefix
    pub doc_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    pub passage_count: usize,

    /// Source length in characters
    pub char_count: usize,

    pub ingested_at: DateTime<Utc>,
}

/// Statistics for a passage store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreStats {
    pub index_name: String,
    pub sources_count: usize,
    pub passages_count: usize,

    /// Size of passages.jsonl on disk
    pub size_bytes: u64,

    pub last_ingested_at: Option<DateTime<Utc>>,
}

/// A span produced by the chunker, before metadata is attached.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkCandidate {
    pub document_id: String,
    pub position: usize,
    /// Character offsets into the source text, end exclusive
    pub start: usize,
    pub end: usize,
    pub text: String,
}
