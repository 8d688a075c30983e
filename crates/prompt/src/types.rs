//! Prompt types for Veritas.
//!
//! Style presets are a closed set. Each one fixes its formatting instructions,
//! whether the backend must answer with a table, and whether raw JSON is the
//! only acceptable output.

use serde::{Deserialize, Serialize};

/// Output contract for the `json` preset, including the in-object refusal.
pub const JSON_SCHEMA_INSTRUCTION: &str = "Return strictly one valid JSON object with the keys \
`answer` (string), `bullets` (array of strings) and `citations_used` (array of integers). \
Every bullet must contain [n]. If the answer is not present in the context, return \
{\"answer\": \"not found in context\", \"bullets\": [], \"citations_used\": []}. \
Do not output anything outside the JSON object.";

/// Output-format contract requested by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StylePreset {
    #[default]
    Base,
    AuditBullets,
    Concise,
    Qa,
    Compare,
    Table,
    Json,
    #[serde(alias = "mitre-card")]
    Card,
}

impl StylePreset {
    pub const ALL: [StylePreset; 8] = [
        StylePreset::Base,
        StylePreset::AuditBullets,
        StylePreset::Concise,
        StylePreset::Qa,
        StylePreset::Compare,
        StylePreset::Table,
        StylePreset::Json,
        StylePreset::Card,
    ];

    /// Parse a preset name, case-insensitively. `mitre-card` is accepted for `card`.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "base" => Some(Self::Base),
            "audit-bullets" => Some(Self::AuditBullets),
            "concise" => Some(Self::Concise),
            "qa" => Some(Self::Qa),
            "compare" => Some(Self::Compare),
            "table" => Some(Self::Table),
            "json" => Some(Self::Json),
            "card" | "mitre-card" => Some(Self::Card),
            _ => None,
        }
    }

    /// Parse, falling back to `base` for missing or unknown names.
    pub fn parse_or_base(s: Option<&str>) -> Self {
        match s {
            None => Self::Base,
            Some(name) => Self::parse(name).unwrap_or_else(|| {
                tracing::warn!(style = name, "Unknown style preset, using base");
                Self::Base
            }),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Base => "base",
            Self::AuditBullets => "audit-bullets",
            Self::Concise => "concise",
            Self::Qa => "qa",
            Self::Compare => "compare",
            Self::Table => "table",
            Self::Json => "json",
            Self::Card => "card",
        }
    }

    /// Column headers the backend must use, for tabular presets.
    pub fn table_columns(&self) -> Option<&'static [&'static str]> {
        match self {
            Self::Compare => Some(&["Item", "Evidence [n]", "Observations"]),
            Self::Table => Some(&["Field", "Content", "Source [n]"]),
            _ => None,
        }
    }

    pub fn requires_table(&self) -> bool {
        self.table_columns().is_some()
    }

    /// Output must be a single JSON object and nothing else.
    pub fn requires_json(&self) -> bool {
        matches!(self, Self::Json)
    }

    /// Every preset except `base` shows a source line under each passage.
    pub fn shows_sources(&self) -> bool {
        !matches!(self, Self::Base)
    }

    /// Formatting instructions appended after the question.
    pub fn instructions(&self) -> String {
        match self {
            Self::Base => "Answer in plain prose and cite the passages you use as [n].".to_string(),
            Self::AuditBullets => "Format the answer as a list of short, verifiable bullet points. \
                Every important claim must end with [n]."
                .to_string(),
            Self::Concise => {
                "Answer concisely in 3 to 6 bullets; every line must end with [n].".to_string()
            }
            Self::Qa => "First give a DIRECT ANSWER in 1 to 2 sentences. \
                Then give DETAILS as bullets, each with [n]."
                .to_string(),
            Self::Compare => format!(
                "Produce a Markdown TABLE comparing the items. Columns: {}.",
                self.table_columns().unwrap_or_default().join(" | ")
            ),
            Self::Table => format!(
                "Summarize the answer as a Markdown TABLE. Columns: {}.",
                self.table_columns().unwrap_or_default().join(" | ")
            ),
            Self::Json => JSON_SCHEMA_INSTRUCTION.to_string(),
            Self::Card => "Format the answer as a MITRE ATT&CK card with the sections \
                Tactics, Technique/Subtechnique, Platforms, Mitigations, Detections and \
                References. Every claim must carry [n]."
                .to_string(),
        }
    }

    /// Skeleton that opens the answer section of the prompt.
    pub fn answer_scaffold(&self) -> &'static str {
        match self {
            Self::Base | Self::Concise => "# Answer:",
            Self::AuditBullets => "# Answer (one bullet per line, each with [n]):",
            Self::Qa => "# Direct answer:\n\n# Details:\n- ",
            Self::Compare => {
                "# Answer (Markdown table):\n| Item | Evidence | Observations |\n|---|---|---|"
            }
            Self::Table => "# Answer (Markdown table):\n| Field | Content | Source |\n|---|---|---|",
            Self::Json => "# Answer (JSON only):",
            Self::Card => {
                "# Answer (card):\n\
                 ## Tactics:\n- ... [n]\n\n\
                 ## Technique/Subtechnique:\n- ... [n]\n\n\
                 ## Platforms:\n- ... [n]\n\n\
                 ## Mitigations:\n- ... [n]\n\n\
                 ## Detections:\n- ... [n]\n\n\
                 ## References:\n- ... [n]"
            }
        }
    }
}

impl std::fmt::Display for StylePreset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Workspace override for one preset, loaded from `<promptsDir>/<preset>.yml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresetOverride {
    /// Preset this file replaces
    pub preset: StylePreset,

    /// Human-readable title
    pub title: String,

    /// API version for schema evolution
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    /// Replacement formatting instructions
    pub instructions: String,

    /// Replacement answer scaffold
    #[serde(rename = "answerScaffold", default, skip_serializing_if = "Option::is_none")]
    pub answer_scaffold: Option<String>,

    /// Full Handlebars template replacing the built-in layout
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
}

/// A rendered prompt ready for the generation adapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuiltPrompt {
    /// Full prompt text
    pub text: String,

    /// Metadata about the built prompt
    pub metadata: BuiltPromptMetadata,
}

/// Metadata about a built prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuiltPromptMetadata {
    pub preset: StylePreset,

    /// Number of numbered passages in the context block
    #[serde(rename = "passageCount")]
    pub passage_count: usize,

    #[serde(rename = "underCited")]
    pub under_cited: bool,

    /// Whether a workspace override shaped the prompt
    #[serde(rename = "overrideApplied")]
    pub override_applied: bool,
}
