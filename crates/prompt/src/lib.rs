//! Prompt system for Veritas.
//!
//! Turns a frozen [`veritas_core::Context`], the user's question and a
//! [`StylePreset`] into the prompt text handed to the generation backend:
//! - Built-in presets with fixed output contracts
//! - Handlebars rendering of the prompt layout
//! - Optional per-preset YAML overrides from the workspace

pub mod builder;
pub mod loader;
pub mod types;

// Re-export main types
pub use builder::{build_prompt, render_context_block, PromptBuilder};
pub use loader::load_overrides;
pub use types::{BuiltPrompt, BuiltPromptMetadata, PresetOverride, StylePreset, JSON_SCHEMA_INSTRUCTION};
