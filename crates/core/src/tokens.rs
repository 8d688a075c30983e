//! Token cost estimation.
//!
//! Budgets are enforced against an estimate, never a real tokenizer. The
//! estimator is a closed set of variants chosen in configuration.

use serde::{Deserialize, Serialize};
use unicode_segmentation::UnicodeSegmentation;

/// Approximate token counter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum TokenEstimator {
    /// `chars / ratio`, at least one token for non-empty text.
    CharsPerToken { ratio: f32 },
    /// Unicode word count multiplied by `factor`, rounded up.
    WordScaled { factor: f32 },
}

impl Default for TokenEstimator {
    fn default() -> Self {
        TokenEstimator::CharsPerToken { ratio: 4.0 }
    }
}

impl TokenEstimator {
    /// Estimated token count of `text`. Empty text costs nothing.
    pub fn estimate(&self, text: &str) -> usize {
        if text.is_empty() {
            return 0;
        }
        match *self {
            TokenEstimator::CharsPerToken { ratio } => {
                let chars = text.chars().count() as f32;
                ((chars / ratio) as usize).max(1)
            }
            TokenEstimator::WordScaled { factor } => {
                let words = text.unicode_words().count() as f32;
                (words * factor).ceil() as usize
            }
        }
    }

    /// The scaling parameter, used by configuration validation.
    pub fn parameter(&self) -> f32 {
        match *self {
            TokenEstimator::CharsPerToken { ratio } => ratio,
            TokenEstimator::WordScaled { factor } => factor,
        }
    }
}
