//! Deterministic character-trigram hash vectors.
//!
//! Not semantic, but stable and content dependent, which is enough for a
//! local index that needs no model.

use std::collections::{BTreeMap, HashSet};

pub const DIMENSIONS: usize = 384;

const STOP_WORDS: &[&str] = &[
    "the", "is", "at", "which", "on", "a", "an", "as", "are", "was", "were", "for", "to", "of",
    "in", "and", "or", "but", "with", "by", "from", "this", "that", "be", "have", "has", "had",
    "it", "its", "their", "they", "them", "what", "how", "does", "do",
];

/// Lowercased content terms longer than two chars, stop words removed.
pub fn terms(text: &str) -> Vec<String> {
    let stop_words: HashSet<&str> = STOP_WORDS.iter().copied().collect();
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.chars().count() > 2 && !stop_words.contains(w))
        .map(str::to_string)
        .collect()
}

/// Unit-length vector of `DIMENSIONS` floats. Text without terms maps to zeros.
pub fn embed(text: &str) -> Vec<f32> {
    let mut vector = vec![0.0f32; DIMENSIONS];

    // Ordered so float accumulation is reproducible
    let mut freq: BTreeMap<String, usize> = BTreeMap::new();
    for term in terms(text) {
        *freq.entry(term).or_insert(0) += 1;
    }

    for (word, count) in &freq {
        let chars: Vec<char> = word.chars().collect();
        for window in chars.windows(3) {
            let hash = window
                .iter()
                .collect::<String>()
                .bytes()
                .fold(0u64, |acc, b| acc.wrapping_mul(37).wrapping_add(b as u64));
            vector[(hash as usize) % DIMENSIONS] += (*count as f32).sqrt();
        }

        let hash = word
            .bytes()
            .fold(0u64, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u64));
        vector[(hash as usize) % DIMENSIONS] += *count as f32;
    }

    let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for v in &mut vector {
            *v /= norm;
        }
    }
    vector
}

/// Cosine similarity; zero when either vector is all zeros.
pub fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na == 0.0 || nb == 0.0 {
        0.0
    } else {
        dot / (na * nb)
    }
}
