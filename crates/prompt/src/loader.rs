//! Loader for per-preset YAML overrides.
//!
//! Overrides live in `<promptsDir>/<preset>.yml` and are read once at startup.
//! A file that does not parse or validate is a configuration error.

use crate::types::{PresetOverride, StylePreset};
use handlebars::Handlebars;
use std::collections::HashMap;
use std::path::Path;
use veritas_core::{AppError, AppResult};

/// Load every override in `prompts_dir`, keyed by preset.
///
/// A missing directory yields no overrides.
///
/// # Example
/// ```no_run
/// use veritas_prompt::{load_overrides, PromptBuilder};
/// use std::path::Path;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let overrides = load_overrides(Path::new(".veritas/prompts"))?;
/// let builder = PromptBuilder::with_overrides(overrides);
/// # Ok(())
/// # }
/// ```
pub fn load_overrides(prompts_dir: &Path) -> AppResult<HashMap<StylePreset, PresetOverride>> {
    let mut overrides = HashMap::new();

    if !prompts_dir.exists() {
        tracing::debug!(dir = %prompts_dir.display(), "No preset override directory");
        return Ok(overrides);
    }

    for path in list_override_files(prompts_dir) {
        let definition = load_override_file(&path)?;

        let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
        if StylePreset::parse(stem) != Some(definition.preset) {
            return Err(AppError::InvalidConfiguration(format!(
                "Preset override {:?} declares preset '{}' but is named '{}'",
                path, definition.preset, stem
            )));
        }

        if overrides.contains_key(&definition.preset) {
            return Err(AppError::InvalidConfiguration(format!(
                "Duplicate override for preset '{}' in {:?}",
                definition.preset, prompts_dir
            )));
        }

        tracing::info!(preset = %definition.preset, title = %definition.title, "Loaded preset override");
        overrides.insert(definition.preset, definition);
    }

    Ok(overrides)
}

fn list_override_files(prompts_dir: &Path) -> Vec<std::path::PathBuf> {
    walkdir::WalkDir::new(prompts_dir)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .map(|e| e.into_path())
        .filter(|path| {
            path.is_file()
                && matches!(
                    path.extension().and_then(|s| s.to_str()),
                    Some("yml") | Some("yaml")
                )
        })
        .collect()
}

fn load_override_file(path: &Path) -> AppResult<PresetOverride> {
    let contents = std::fs::read_to_string(path).map_err(|e| {
        AppError::InvalidConfiguration(format!("Failed to read preset override {:?}: {}", path, e))
    })?;

    let definition: PresetOverride = serde_yaml::from_str(&contents).map_err(|e| {
        AppError::InvalidConfiguration(format!("Failed to parse preset override {:?}: {}", path, e))
    })?;

    validate_override(&definition)?;
    Ok(definition)
}

/// Validate a preset override.
fn validate_override(def: &PresetOverride) -> AppResult<()> {
    if def.title.trim().is_empty() {
        return Err(AppError::InvalidConfiguration(format!(
            "Override for '{}': title cannot be empty",
            def.preset
        )));
    }

    if def.instructions.trim().is_empty() {
        return Err(AppError::InvalidConfiguration(format!(
            "Override for '{}': instructions cannot be empty",
            def.preset
        )));
    }

    if !def.api_version.contains('.') {
        return Err(AppError::InvalidConfiguration(format!(
            "Override for '{}': invalid apiVersion '{}'. Expected format: 'x.y'",
            def.preset, def.api_version
        )));
    }

    if let Some(template) = &def.template {
        for required in ["system", "context"] {
            if !template.contains(&format!("{{{{{}}}}}", required)) {
                return Err(AppError::InvalidConfiguration(format!(
                    "Override for '{}': template must include {{{{{}}}}}",
                    def.preset, required
                )));
            }
        }
        Handlebars::new()
            .register_template_string("override", template)
            .map_err(|e| {
                AppError::InvalidConfiguration(format!(
                    "Override for '{}': template does not compile: {}",
                    def.preset, e
                ))
            })?;
    }

    Ok(())
}
