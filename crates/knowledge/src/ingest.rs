//! Ingestion: chunk documents and append them to a passage store.

use chrono::Utc;
use std::collections::BTreeMap;
use std::time::Instant;

use crate::chunker::{chunk_document, validate_chunking};
use crate::store::PassageStore;
use crate::types::{IngestDoc, IngestRequest, IngestStats, SourceRecord};
use veritas_core::{AppError, AppResult, Passage};

/// Chunk and store every text and document in `request`.
///
/// Parameters are validated before anything is written. Blank texts and
/// documents are skipped.
pub fn ingest(store: &PassageStore, request: &IngestRequest) -> AppResult<IngestStats> {
    let start = Instant::now();
    validate_request(request)?;

    let mut passages = Vec::new();
    let mut sources = Vec::new();

    for text in &request.texts {
        let text = text.trim();
        if text.is_empty() {
            continue;
        }
        let id = uuid::Uuid::new_v4().to_string();
        sources.push(source_record(&id, &id, None, None, 1, text));
        passages.push(Passage::new(id, text, 0.0));
    }

    for doc in &request.docs {
        let text = doc.text.trim();
        if text.is_empty() {
            tracing::debug!(id = ?doc.id, "Skipping blank document");
            continue;
        }

        let source_id = meta_string(doc, "attack_id")
            .or_else(|| doc.id.clone())
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let doc_id = doc.id.clone().unwrap_or_else(|| source_id.clone());
        let name = meta_string(doc, "name");
        let url = first_url(doc);

        let mut metadata = flatten_metadata(&doc.metadata);
        metadata.insert("source_id".to_string(), source_id.clone());
        if let Some(name) = &name {
            metadata.insert("source_name".to_string(), name.clone());
        }
        if let Some(url) = &url {
            metadata.insert("url".to_string(), url.clone());
        }

        let chunks = chunk_document(
            &doc_id,
            text,
            &metadata,
            request.chunk_size,
            request.chunk_overlap,
        )?;
        sources.push(source_record(&source_id, &doc_id, name, url, chunks.len(), text));
        passages.extend(chunks);
    }

    store.append_passages(&passages)?;
    for source in &sources {
        store.track_source(source)?;
    }

    let stats = IngestStats {
        received_texts: request.texts.len(),
        received_docs: request.docs.len(),
        sources_count: sources.len(),
        passages_count: passages.len(),
        duration_secs: start.elapsed().as_secs_f64(),
    };

    tracing::info!(
        sources = stats.sources_count,
        passages = stats.passages_count,
        "Ingest complete"
    );

    Ok(stats)
}

/// Reject a request before anything is written.
pub fn validate_request(request: &IngestRequest) -> AppResult<()> {
    validate_chunking(request.chunk_size, request.chunk_overlap)?;

    let has_texts = request.texts.iter().any(|t| !t.trim().is_empty());
    if !has_texts && request.docs.is_empty() {
        return Err(AppError::InvalidConfiguration(
            "Nothing to ingest: provide at least one of 'texts' or 'docs'".to_string(),
        ));
    }
    Ok(())
}

fn source_record(
    source_id: &str,
    doc_id: &str,
    name: Option<String>,
    url: Option<String>,
    passage_count: usize,
    text: &str,
) -> SourceRecord {
    SourceRecord {
        source_id: source_id.to_string(),
        doc_id: doc_id.to_string(),
        name,
        url,
        passage_count,
        char_count: text.chars().count(),
        ingested_at: Utc::now(),
    }
}

fn meta_string(doc: &IngestDoc, key: &str) -> Option<String> {
    doc.metadata
        .get(key)
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// `url`, else the first entry of `urls`.
fn first_url(doc: &IngestDoc) -> Option<String> {
    meta_string(doc, "url").or_else(|| {
        doc.metadata
            .get("urls")
            .and_then(|v| v.as_array())
            .and_then(|urls| urls.first())
            .and_then(|v| v.as_str())
            .map(str::to_string)
    })
}

/// Strings stay as they are; everything else becomes JSON text. Nulls are dropped.
fn flatten_metadata(metadata: &BTreeMap<String, serde_json::Value>) -> BTreeMap<String, String> {
    metadata
        .iter()
        .filter(|(_, v)| !v.is_null())
        .map(|(k, v)| {
            let value = match v {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (k.clone(), value)
        })
        .collect()
}
