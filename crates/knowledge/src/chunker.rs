//! Text chunking with configurable size and overlap.
//!
//! Sizes are measured in characters. Span `i` starts at `i * (size - overlap)`;
//! once the remaining text fits in one span, that span is the last one.

use std::collections::BTreeMap;

use crate::types::ChunkCandidate;
use veritas_core::{AppError, AppResult, Passage};

/// Split `text` into overlapping spans.
///
/// # Errors
/// `InvalidConfiguration` when `chunk_size` is zero or `overlap >= chunk_size`.
pub fn chunk_text(
    document_id: &str,
    text: &str,
    chunk_size: usize,
    overlap: usize,
) -> AppResult<Vec<ChunkCandidate>> {
    validate_chunking(chunk_size, overlap)?;

    if text.is_empty() {
        return Ok(Vec::new());
    }

    // Byte offset of every char, plus the end of the text
    let offsets: Vec<usize> = text
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .collect();
    let total = offsets.len() - 1;
    let step = chunk_size - overlap;

    let mut chunks = Vec::new();
    let mut start = 0;

    loop {
        let end = (start + chunk_size).min(total);
        chunks.push(ChunkCandidate {
            document_id: document_id.to_string(),
            position: chunks.len(),
            start,
            end,
            text: text[offsets[start]..offsets[end]].to_string(),
        });

        if end == total {
            break;
        }
        start += step;
    }

    tracing::debug!(
        document = document_id,
        chunks = chunks.len(),
        chunk_size,
        overlap,
        "Chunked text"
    );

    Ok(chunks)
}

/// Chunk a document into passages that inherit its metadata.
///
/// Each passage gets id `<document_id>::<n>` and the extra keys `chunk_of`,
/// `chunk_index` and `is_chunk`.
pub fn chunk_document(
    document_id: &str,
    text: &str,
    metadata: &BTreeMap<String, String>,
    chunk_size: usize,
    overlap: usize,
) -> AppResult<Vec<Passage>> {
    let spans = chunk_text(document_id, text, chunk_size, overlap)?;
    let is_chunk = spans.len() > 1;

    Ok(spans
        .into_iter()
        .map(|span| {
            let mut meta = metadata.clone();
            meta.insert("chunk_of".to_string(), document_id.to_string());
            meta.insert("chunk_index".to_string(), span.position.to_string());
            meta.insert("is_chunk".to_string(), is_chunk.to_string());
            Passage {
                id: format!("{}::{}", document_id, span.position),
                text: span.text,
                score: 0.0,
                metadata: meta,
            }
        })
        .collect())
}

/// Reject chunking parameters before any text is processed.
pub fn validate_chunking(chunk_size: usize, overlap: usize) -> AppResult<()> {
    if chunk_size == 0 {
        return Err(AppError::InvalidConfiguration(
            "chunk_size must be greater than zero".to_string(),
        ));
    }
    if overlap >= chunk_size {
        return Err(AppError::InvalidConfiguration(format!(
            "chunk_overlap ({}) must be smaller than chunk_size ({})",
            overlap, chunk_size
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Rebuild the source by dropping each later span's overlap prefix.
    fn reconstruct(chunks: &[ChunkCandidate], overlap: usize) -> String {
        let mut out = String::new();
        for (i, chunk) in chunks.iter().enumerate() {
            let skip = if i == 0 { 0 } else { overlap };
            out.extend(chunk.text.chars().skip(skip));
        }
        out
    }

    struct Lcg(u64);

    impl Lcg {
        fn next(&mut self) -> u64 {
            self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            self.0 >> 33
        }

        fn below(&mut self, n: u64) -> u64 {
            self.next() % n
        }
    }

    #[test]
    fn test_chunk_text_no_overlap() {
        let text = "a".repeat(300);
        let chunks = chunk_text("doc", &text, 100, 0).unwrap();

        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|c| c.text.len() == 100));
    }

    #[test]
    fn test_final_span_covers_remainder_once() {
        let text = "abcdefghij";
        let chunks = chunk_text("doc", text, 4, 1).unwrap();
        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["abcd", "defg", "ghij"]);

        let chunks = chunk_text("doc", "abcdefghijk", 4, 1).unwrap();
        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["abcd", "defg", "ghij", "jk"]);
    }

    #[test]
    fn test_short_text_is_single_span() {
        let chunks = chunk_text("doc", "short", 800, 100).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "short");
        assert_eq!((chunks[0].start, chunks[0].end), (0, 5));
    }

    #[test]
    fn test_chunk_text_empty() {
        assert!(chunk_text("doc", "", 100, 10).unwrap().is_empty());
    }

    #[test]
    fn test_invalid_parameters() {
        assert_eq!(
            chunk_text("doc", "text", 0, 0).unwrap_err().kind(),
            "invalid_configuration"
        );
        assert!(chunk_text("doc", "text", 10, 10).is_err());
        assert!(chunk_text("doc", "", 10, 11).is_err());
    }

    #[test]
    fn test_multibyte_text_is_split_on_chars() {
        let text = "não encontrei ção 🎮 ação".repeat(5);
        let chunks = chunk_text("doc", &text, 7, 2).unwrap();
        assert!(chunks.iter().all(|c| c.text.chars().count() <= 7));
        assert_eq!(reconstruct(&chunks, 2), text);
    }

    #[test]
    fn test_reconstruction_law_random_configs() {
        let alphabet: Vec<char> = "ab cdé\nfg🎮h".chars().collect();
        let mut rng = Lcg(7);

        for _ in 0..300 {
            let len = rng.below(400) as usize;
            let text: String = (0..len)
                .map(|_| alphabet[rng.below(alphabet.len() as u64) as usize])
                .collect();
            let chunk_size = 2 + rng.below(60) as usize;
            let overlap = 1 + rng.below(chunk_size as u64 - 1) as usize;

            let chunks = chunk_text("doc", &text, chunk_size, overlap).unwrap();
            assert_eq!(reconstruct(&chunks, overlap), text);

            for pair in chunks.windows(2) {
                assert_eq!(pair[1].start - pair[0].start, chunk_size - overlap);
                assert_eq!(pair[0].text.chars().count(), chunk_size);
            }
        }
    }

    #[test]
    fn test_chunk_document_inherits_metadata() {
        let mut meta = BTreeMap::new();
        meta.insert("source_id".to_string(), "T1477".to_string());
        meta.insert("url".to_string(), "https://attack.mitre.org/techniques/T1477".to_string());

        let passages = chunk_document("T1477", &"x".repeat(25), &meta, 10, 2).unwrap();
        assert_eq!(passages.len(), 3);
        assert_eq!(passages[1].id, "T1477::1");
        assert_eq!(passages[1].metadata["source_id"], "T1477");
        assert_eq!(passages[1].metadata["chunk_index"], "1");
        assert_eq!(passages[1].metadata["is_chunk"], "true");
        assert_eq!(passages[2].metadata["chunk_of"], "T1477");

        let single = chunk_document("doc", "tiny", &meta, 10, 2).unwrap();
        assert_eq!(single[0].metadata["is_chunk"], "false");
    }
}
