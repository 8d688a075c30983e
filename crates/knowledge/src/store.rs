//! Append-only passage store.
//!
//! One directory per index holding `passages.jsonl` and `sources.jsonl`.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use crate::types::{SourceRecord, StoreStats};
use veritas_core::{AppError, AppResult, Passage};

const PASSAGES_FILE: &str = "passages.jsonl";
const SOURCES_FILE: &str = "sources.jsonl";

/// Passages and source records for one index.
#[derive(Debug, Clone)]
pub struct PassageStore {
    dir: PathBuf,
}

impl PassageStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn passages_path(&self) -> PathBuf {
        self.dir.join(PASSAGES_FILE)
    }

    fn sources_path(&self) -> PathBuf {
        self.dir.join(SOURCES_FILE)
    }

    /// Whether anything has been written yet.
    pub fn exists(&self) -> bool {
        self.passages_path().exists()
    }

    /// Append passages; scores are not persisted.
    pub fn append_passages(&self, passages: &[Passage]) -> AppResult<()> {
        let stored: Vec<Passage> = passages
            .iter()
            .map(|p| Passage {
                score: 0.0,
                ..p.clone()
            })
            .collect();
        append_lines(&self.passages_path(), &stored)?;
        tracing::debug!(count = passages.len(), "Appended passages");
        Ok(())
    }

    /// Track an ingested document by appending to sources.jsonl.
    pub fn track_source(&self, source: &SourceRecord) -> AppResult<()> {
        append_lines(&self.sources_path(), std::slice::from_ref(source))?;
        tracing::debug!(source_id = %source.source_id, "Tracked source");
        Ok(())
    }

    pub fn list_passages(&self) -> AppResult<Vec<Passage>> {
        read_lines(&self.passages_path())
    }

    pub fn list_sources(&self) -> AppResult<Vec<SourceRecord>> {
        read_lines(&self.sources_path())
    }

    /// Remove both files.
    pub fn clear(&self) -> AppResult<()> {
        for path in [self.passages_path(), self.sources_path()] {
            if path.exists() {
                std::fs::remove_file(&path).map_err(|e| {
                    AppError::Other(format!("Failed to delete {}: {}", path.display(), e))
                })?;
            }
        }
        tracing::info!(dir = %self.dir.display(), "Cleared passage store");
        Ok(())
    }

    pub fn stats(&self, index_name: &str) -> AppResult<StoreStats> {
        let sources = self.list_sources()?;
        let passages_count = self.list_passages()?.len();
        let size_bytes = std::fs::metadata(self.passages_path())
            .map(|m| m.len())
            .unwrap_or(0);

        Ok(StoreStats {
            index_name: index_name.to_string(),
            sources_count: sources.len(),
            passages_count,
            size_bytes,
            last_ingested_at: sources.iter().map(|s| s.ingested_at).max(),
        })
    }
}

fn append_lines<T: Serialize>(path: &Path, items: &[T]) -> AppResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| AppError::Other(format!("Failed to open {}: {}", path.display(), e)))?;

    for item in items {
        let line = serde_json::to_string(item)?;
        writeln!(file, "{}", line)
            .map_err(|e| AppError::Other(format!("Failed to write {}: {}", path.display(), e)))?;
    }

    file.sync_all()
        .map_err(|e| AppError::Other(format!("Failed to sync {}: {}", path.display(), e)))?;
    Ok(())
}

fn read_lines<T: DeserializeOwned>(path: &Path) -> AppResult<Vec<T>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let file = File::open(path)
        .map_err(|e| AppError::Other(format!("Failed to open {}: {}", path.display(), e)))?;

    let mut items = Vec::new();
    for (line_num, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let item = serde_json::from_str(&line).map_err(|e| {
            AppError::Serialization(format!(
                "Failed to parse line {} in {}: {}",
                line_num + 1,
                path.display(),
                e
            ))
        })?;
        items.push(item);
    }

    Ok(items)
}
