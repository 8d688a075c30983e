//! Answer assembly: maps generated text back onto the citation manifest.

use regex::Regex;
use serde::Deserialize;
use std::collections::HashSet;
use std::sync::OnceLock;

use crate::rag::types::{AnswerWarning, Citation};
use veritas_core::{AppError, AppResult, CitationManifest, RagConfig};
use veritas_prompt::StylePreset;

/// Reference marker such as `[3]` or `[ 3 ]`.
fn marker_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\[\s*(\d+)\s*\]").expect("marker pattern is valid"))
}

/// Marker numbers in order of first appearance, without repeats.
///
/// Markers too large for `usize` are kept as text so they can be reported.
pub fn extract_markers(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    marker_pattern()
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().trim_start_matches('0').to_string())
        .map(|m| if m.is_empty() { "0".to_string() } else { m })
        .filter(|m| seen.insert(m.clone()))
        .collect()
}

/// Final answer before it is wrapped into a response.
#[derive(Debug, Clone, PartialEq)]
pub struct AssembledAnswer {
    pub answer: String,
    pub citations: Vec<Citation>,
    pub bullets: Vec<String>,
    pub warnings: Vec<AnswerWarning>,
}

/// Object the `json` preset requires from the backend.
#[derive(Debug, Deserialize)]
struct StructuredAnswer {
    answer: String,
    #[serde(default)]
    bullets: Vec<String>,
    #[serde(default)]
    citations_used: Vec<i64>,
}

/// Parses raw backend output against a manifest.
#[derive(Debug, Clone)]
pub struct AnswerAssembler {
    refusal_patterns: Vec<String>,
    fallback_answer: String,
}

impl AnswerAssembler {
    pub fn new(refusal_patterns: Vec<String>, fallback_answer: impl Into<String>) -> Self {
        Self {
            refusal_patterns: refusal_patterns.iter().map(|p| p.to_lowercase()).collect(),
            fallback_answer: fallback_answer.into(),
        }
    }

    pub fn from_config(rag: &RagConfig) -> Self {
        Self::new(rag.refusal_patterns.clone(), rag.fallback_answer.clone())
    }

    pub fn fallback_answer(&self) -> &str {
        &self.fallback_answer
    }

    pub fn is_refusal(&self, text: &str) -> bool {
        let lowered = text.to_lowercase();
        self.refusal_patterns
            .iter()
            .any(|p| !p.is_empty() && lowered.contains(p.as_str()))
    }

    /// Build the answer for `raw` under `preset`.
    ///
    /// # Errors
    /// `MalformedStructuredOutput` when the `json` preset output is not the
    /// required object.
    pub fn assemble(
        &self,
        raw: &str,
        manifest: &CitationManifest,
        preset: StylePreset,
    ) -> AppResult<AssembledAnswer> {
        let text = raw.trim();
        if text.is_empty() {
            tracing::warn!(preset = %preset, "Backend returned empty output");
            return Ok(self.fallback());
        }

        if preset.requires_json() {
            self.assemble_structured(text, manifest)
        } else {
            Ok(self.assemble_text(text, manifest))
        }
    }

    fn fallback(&self) -> AssembledAnswer {
        AssembledAnswer {
            answer: self.fallback_answer.clone(),
            citations: Vec::new(),
            bullets: Vec::new(),
            warnings: Vec::new(),
        }
    }

    fn assemble_text(&self, text: &str, manifest: &CitationManifest) -> AssembledAnswer {
        let (citations, mut warnings) = resolve_markers(extract_markers(text), manifest);

        if citations.is_empty() {
            if self.is_refusal(text) {
                tracing::debug!("Backend refused: answer not in context");
                return AssembledAnswer {
                    answer: text.to_string(),
                    citations: Vec::new(),
                    bullets: Vec::new(),
                    warnings,
                };
            }
            if !manifest.is_empty() {
                warnings.push(AnswerWarning::NoCitationsUsed);
            }
        }

        AssembledAnswer {
            answer: text.to_string(),
            citations,
            bullets: Vec::new(),
            warnings,
        }
    }

    /// Plain refusal text with no object and no markers.
    fn is_bare_refusal(&self, text: &str) -> bool {
        !text.contains('{') && extract_markers(text).is_empty() && self.is_refusal(text)
    }

    fn assemble_structured(
        &self,
        text: &str,
        manifest: &CitationManifest,
    ) -> AppResult<AssembledAnswer> {
        let parsed: StructuredAnswer = match serde_json::from_str(text) {
            Ok(parsed) => parsed,
            Err(_) if self.is_bare_refusal(text) => {
                tracing::debug!("Backend refused outside the JSON object");
                return Ok(AssembledAnswer {
                    answer: text.to_string(),
                    citations: Vec::new(),
                    bullets: Vec::new(),
                    warnings: Vec::new(),
                });
            }
            Err(e) => {
                let head: String = text.chars().take(80).collect();
                return Err(AppError::MalformedStructuredOutput(format!(
                    "{} (output starts with {:?})",
                    e, head
                )));
            }
        };

        let mut markers: Vec<String> = parsed
            .citations_used
            .iter()
            .map(|n| n.to_string())
            .collect();
        markers.extend(extract_markers(&parsed.answer));
        for bullet in &parsed.bullets {
            markers.extend(extract_markers(bullet));
        }
        let mut seen = HashSet::new();
        markers.retain(|m| seen.insert(m.clone()));

        let (citations, mut warnings) = resolve_markers(markers, manifest);
        if citations.is_empty() && !manifest.is_empty() && !self.is_refusal(&parsed.answer) {
            warnings.push(AnswerWarning::NoCitationsUsed);
        }

        Ok(AssembledAnswer {
            answer: parsed.answer.trim().to_string(),
            citations,
            bullets: parsed.bullets,
            warnings,
        })
    }
}

/// Split markers into manifest citations and integrity warnings.
fn resolve_markers(
    markers: Vec<String>,
    manifest: &CitationManifest,
) -> (Vec<Citation>, Vec<AnswerWarning>) {
    let mut citations = Vec::new();
    let mut warnings = Vec::new();

    for marker in markers {
        match marker.parse::<usize>().ok().and_then(|n| manifest.get(n)) {
            Some(entry) => citations.push(Citation::from_entry(entry)),
            None => {
                tracing::warn!(marker = %marker, "Answer cites a marker outside the context");
                warnings.push(AnswerWarning::CitationIntegrity { marker });
            }
        }
    }

    (citations, warnings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use veritas_core::{Context, Passage};

    fn manifest(count: usize) -> CitationManifest {
        let passages = (1..=count)
            .map(|i| {
                Passage::new(format!("T{}", 1476 + i), format!("passage {}", i), i as f32)
                    .with_meta("url", format!("https://attack.mitre.org/techniques/T{}", 1476 + i))
            })
            .collect();
        Context {
            passages,
            ..Context::default()
        }
        .manifest()
    }

    fn assembler() -> AnswerAssembler {
        AnswerAssembler::from_config(&RagConfig::default())
    }

    fn ids(answer: &AssembledAnswer) -> Vec<&str> {
        answer.citations.iter().map(|c| c.id.as_str()).collect()
    }

    #[test]
    fn test_extract_markers_order_and_spacing() {
        assert_eq!(
            extract_markers("See [2], then [ 1 ] and [2] again, [03]."),
            vec!["2", "1", "3"]
        );
        assert!(extract_markers("no markers, [a] [] [-1]").is_empty());
    }

    #[test]
    fn test_used_markers_only() {
        let answer = assembler()
            .assemble("Avoid broad permissions [1].", &manifest(3), StylePreset::Base)
            .unwrap();
        assert_eq!(ids(&answer), vec!["T1477"]);
        assert_eq!(answer.citations[0].score, 1.0);
        assert!(answer.warnings.is_empty());
    }

    #[test]
    fn test_unknown_marker_is_integrity_warning() {
        let answer = assembler()
            .assemble("Claim [2] and [7].", &manifest(2), StylePreset::Concise)
            .unwrap();
        assert_eq!(ids(&answer), vec!["T1478"]);
        assert_eq!(
            answer.warnings,
            vec![AnswerWarning::CitationIntegrity { marker: "7".to_string() }]
        );

        let zero = assembler()
            .assemble("Claim [0].", &manifest(2), StylePreset::Base)
            .unwrap();
        assert!(zero.citations.is_empty());
        assert!(zero
            .warnings
            .contains(&AnswerWarning::CitationIntegrity { marker: "0".to_string() }));
    }

    #[test]
    fn test_huge_marker_is_reported_not_cited() {
        let answer = assembler()
            .assemble("[99999999999999999999999]", &manifest(1), StylePreset::Base)
            .unwrap();
        assert!(answer.citations.is_empty());
        assert!(matches!(
            answer.warnings[0],
            AnswerWarning::CitationIntegrity { .. }
        ));
    }

    #[test]
    fn test_refusal_is_verbatim_success() {
        let answer = assembler()
            .assemble("  Not found in context.  ", &manifest(0), StylePreset::Base)
            .unwrap();
        assert_eq!(answer.answer, "Not found in context.");
        assert!(answer.citations.is_empty());
        assert!(answer.warnings.is_empty());

        let pt = assembler()
            .assemble("Não encontrei essa informação.", &manifest(2), StylePreset::Qa)
            .unwrap();
        assert!(pt.citations.is_empty());
        assert!(pt.warnings.is_empty());
    }

    #[test]
    fn test_uncited_answer_warns() {
        let answer = assembler()
            .assemble("Use least privilege.", &manifest(2), StylePreset::Base)
            .unwrap();
        assert_eq!(answer.warnings, vec![AnswerWarning::NoCitationsUsed]);
    }

    #[test]
    fn test_empty_output_uses_fallback() {
        for preset in [StylePreset::Base, StylePreset::Json] {
            let answer = assembler().assemble(" \n", &manifest(2), preset).unwrap();
            assert_eq!(answer.answer, "not found in context");
            assert!(answer.citations.is_empty());
        }
    }

    #[test]
    fn test_json_union_of_citations() {
        let raw = r#"{"answer": "Restrict apps [2].", "bullets": ["Review [3]", "Audit [2]"], "citations_used": [1, 9]}"#;
        let answer = assembler().assemble(raw, &manifest(3), StylePreset::Json).unwrap();

        assert_eq!(answer.answer, "Restrict apps [2].");
        assert_eq!(answer.bullets.len(), 2);
        assert_eq!(ids(&answer), vec!["T1477", "T1478", "T1479"]);
        assert_eq!(
            answer.warnings,
            vec![AnswerWarning::CitationIntegrity { marker: "9".to_string() }]
        );
    }

    #[test]
    fn test_json_is_strict() {
        for raw in [
            "not valid json",
            "```json\n{\"answer\": \"x\"}\n```",
            r#"{"bullets": []}"#,
            r#"{"answer": 3}"#,
            r#"Here it is: {"answer": "x"}"#,
        ] {
            let err = assembler()
                .assemble(raw, &manifest(1), StylePreset::Json)
                .unwrap_err();
            assert!(matches!(err, AppError::MalformedStructuredOutput(_)));
            assert_eq!(err.kind(), "generation_failed");
        }
    }

    #[test]
    fn test_json_refusal_is_success() {
        let in_object = r#"{"answer": "not found in context", "bullets": [], "citations_used": []}"#;
        for raw in [in_object, "not found in context", "Not found in context."] {
            let answer = assembler()
                .assemble(raw, &manifest(2), StylePreset::Json)
                .unwrap();
            assert!(answer.answer.to_lowercase().starts_with("not found in context"));
            assert!(answer.citations.is_empty());
            assert!(answer.warnings.is_empty());
        }

        // A refusal that still cites or opens an object is not a bare refusal
        for raw in ["not found in context [1]", r#"not found in context {"answer""#] {
            let err = assembler()
                .assemble(raw, &manifest(2), StylePreset::Json)
                .unwrap_err();
            assert_eq!(err.kind(), "generation_failed");
        }
    }

    #[test]
    fn test_never_cites_outside_manifest() {
        let manifest = manifest(4);
        let texts = [
            "[1][2][3][4][5][6]",
            "[ 4 ] and [40] and [04]",
            "[1] [1] [1]",
            "nothing here",
        ];
        for text in texts {
            let answer = assembler().assemble(text, &manifest, StylePreset::Base).unwrap();
            for citation in &answer.citations {
                assert!(manifest.contains(citation.marker));
            }
            let unique: HashSet<usize> = answer.citations.iter().map(|c| c.marker).collect();
            assert_eq!(unique.len(), answer.citations.len());
        }
    }
}
