//! Prompt builder: renders a frozen context, a question and a style preset
//! into the single prompt string sent to the generation backend.
//!
//! Building is a pure function of its inputs. Identical inputs always yield
//! byte-identical text.

use crate::types::{BuiltPrompt, BuiltPromptMetadata, PresetOverride, StylePreset, JSON_SCHEMA_INSTRUCTION};
use handlebars::Handlebars;
use std::collections::{BTreeMap, HashMap};
use veritas_core::{AppError, AppResult, Context};

/// Fixed grounding instruction placed before every context block.
pub const SYSTEM_INSTRUCTION: &str = "You are a careful analyst. Answer only from the \
numbered context below. If the answer is not present in the context, state exactly \
\"not found in context\" in the output format requested below. Cite the passages you \
rely on by their number in square brackets, e.g. [1]. Never cite a number that does not appear in the context.";

/// Added when the context holds fewer passages than the configured minimum.
pub const UNDER_CITED_CAVEAT: &str = "Note: the context below is thin. If it does not \
support a complete answer, say which part is not found in context instead of guessing.";

/// Rendered in place of the passages when the context is empty.
pub const EMPTY_CONTEXT: &str = "(no passages available)";

/// Layout used when no override supplies its own template.
pub const DEFAULT_TEMPLATE: &str = "{{system}}\n\n# Context\n{{context}}\n\n# Question\n{{question}}\n\n{{instructions}}\n\n{{scaffold}}";

/// Builds prompts for every preset, applying workspace overrides when present.
#[derive(Debug, Clone, Default)]
pub struct PromptBuilder {
    overrides: HashMap<StylePreset, PresetOverride>,
}

impl PromptBuilder {
    /// Builder with the built-in presets only.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder with validated overrides (see [`crate::loader::load_overrides`]).
    pub fn with_overrides(overrides: HashMap<StylePreset, PresetOverride>) -> Self {
        Self { overrides }
    }

    /// Render `context`, `question` and `preset` into one prompt.
    ///
    /// Never fails: an override template that does not render is logged and
    /// the built-in layout is used instead.
    pub fn build(&self, context: &Context, question: &str, preset: StylePreset) -> BuiltPrompt {
        let over = self.overrides.get(&preset);

        let mut system = SYSTEM_INSTRUCTION.to_string();
        if context.under_cited {
            system.push('\n');
            system.push_str(UNDER_CITED_CAVEAT);
        }

        let instructions = over
            .map(|o| o.instructions.clone())
            .unwrap_or_else(|| preset.instructions());
        let scaffold = over
            .and_then(|o| o.answer_scaffold.clone())
            .unwrap_or_else(|| preset.answer_scaffold().to_string());

        let mut vars = BTreeMap::new();
        vars.insert("system", system);
        vars.insert(
            "context",
            render_context_block(context, preset.shows_sources()),
        );
        vars.insert("question", question.trim().to_string());
        vars.insert("instructions", instructions);
        vars.insert("scaffold", scaffold);
        vars.insert("preset", preset.as_str().to_string());

        let template = over
            .and_then(|o| o.template.as_deref())
            .unwrap_or(DEFAULT_TEMPLATE);

        let mut text = match render_template(template, &vars) {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(preset = %preset, error = %e, "Override template failed, using built-in layout");
                render_template(DEFAULT_TEMPLATE, &vars).unwrap_or_else(|_| compose_plain(&vars))
            }
        };

        // Overrides may reword the json instructions but never drop the schema
        if preset.requires_json() && !text.contains(JSON_SCHEMA_INSTRUCTION) {
            text.push_str("\n\n");
            text.push_str(JSON_SCHEMA_INSTRUCTION);
        }

        tracing::debug!(
            preset = %preset,
            passages = context.len(),
            chars = text.len(),
            "Built prompt"
        );

        BuiltPrompt {
            text,
            metadata: BuiltPromptMetadata {
                preset,
                passage_count: context.len(),
                under_cited: context.under_cited,
                override_applied: over.is_some(),
            },
        }
    }
}

/// Build with the built-in presets only.
pub fn build_prompt(context: &Context, question: &str, preset: StylePreset) -> BuiltPrompt {
    PromptBuilder::new().build(context, question, preset)
}

/// Numbered passages in citation order, `[n] text`, optionally followed by a
/// `Source:` line.
pub fn render_context_block(context: &Context, show_sources: bool) -> String {
    if context.is_empty() {
        return EMPTY_CONTEXT.to_string();
    }

    context
        .passages
        .iter()
        .enumerate()
        .map(|(i, p)| {
            let mut block = format!("[{}] {}", i + 1, p.text.trim());
            if show_sources {
                block.push_str("\nSource: ");
                block.push_str(p.source_label());
            }
            block
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Render a Handlebars template with variables.
pub(crate) fn render_template(
    template: &str,
    variables: &BTreeMap<&str, String>,
) -> AppResult<String> {
    let mut handlebars = Handlebars::new();

    // Prompts are plain text
    handlebars.register_escape_fn(handlebars::no_escape);
    handlebars.set_strict_mode(true);

    handlebars
        .register_template_string("prompt", template)
        .map_err(|e| AppError::Prompt(format!("Failed to register template: {}", e)))?;

    handlebars
        .render("prompt", variables)
        .map_err(|e| AppError::Prompt(format!("Failed to render template: {}", e)))
}

/// Same layout as [`DEFAULT_TEMPLATE`] without the template engine.
fn compose_plain(vars: &BTreeMap<&str, String>) -> String {
    let get = |k: &str| vars.get(k).map(String::as_str).unwrap_or_default();
    format!(
        "{}\n\n# Context\n{}\n\n# Question\n{}\n\n{}\n\n{}",
        get("system"),
        get("context"),
        get("question"),
        get("instructions"),
        get("scaffold")
    )
}
