//! Backend binary and model resolution.
//!
//! Runs once at startup. The result is an immutable [`ResolvedBackend`] that
//! the generation adapter is built from; nothing here is consulted per request.

use std::path::{Path, PathBuf};

use veritas_core::{AppError, AppResult, GenerationConfig, InvocationStrategy};
use walkdir::WalkDir;

/// Binary names tried inside a llama.cpp build directory, in order.
pub const KNOWN_BINARIES: [&str; 5] = ["llama-cli", "llama-bin", "llama-simple", "main", "llama"];

/// A llama.cpp installation ready to be invoked.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedBackend {
    pub binary: PathBuf,
    pub model: PathBuf,
    pub strategies: Vec<InvocationStrategy>,
}

/// Resolve binary, model and strategy order from configuration.
pub fn resolve(config: &GenerationConfig) -> AppResult<ResolvedBackend> {
    let binary = resolve_binary(config.binary.as_deref(), &config.binary_candidates)?;
    let model = resolve_model(config.model_path.as_deref(), &config.model_search_dirs)?;
    let strategies = if config.strategies.is_empty() {
        default_strategies(&binary)
    } else {
        config.strategies.clone()
    };

    tracing::info!(
        binary = %binary.display(),
        model = %model.display(),
        strategies = ?strategies,
        "Resolved llama.cpp backend"
    );

    Ok(ResolvedBackend {
        binary,
        model,
        strategies,
    })
}

/// `llama-simple` only understands a positional prompt; everything else gets `-p` first.
pub fn default_strategies(binary: &Path) -> Vec<InvocationStrategy> {
    let name = binary
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    if name.starts_with("llama-simple") {
        vec![InvocationStrategy::Positional, InvocationStrategy::PromptFlag]
    } else {
        vec![InvocationStrategy::PromptFlag, InvocationStrategy::Positional]
    }
}

/// Find an executable llama.cpp binary.
///
/// Order: the configured path (or known names inside it when it is a
/// directory), the candidate list, known names next to the configured path,
/// then any `llama-*` on `PATH`.
pub fn resolve_binary(configured: Option<&Path>, candidates: &[PathBuf]) -> AppResult<PathBuf> {
    if let Some(path) = configured {
        if is_executable(path) {
            return Ok(path.to_path_buf());
        }
        if path.is_dir() {
            if let Some(found) = find_in_dir(path) {
                return Ok(found);
            }
        }
    }

    if let Some(found) = candidates.iter().find(|c| is_executable(c)) {
        return Ok(found.clone());
    }

    if let Some(parent) = configured.and_then(Path::parent) {
        if let Some(found) = known_in_dir(parent) {
            return Ok(found);
        }
    }

    if let Some(path_var) = std::env::var_os("PATH") {
        for dir in std::env::split_paths(&path_var) {
            if let Some(found) = llama_prefixed_in_dir(&dir) {
                return Ok(found);
            }
        }
    }

    Err(AppError::BackendUnavailable(format!(
        "No llama.cpp binary found (configured: {}, {} candidate(s), PATH searched)",
        configured
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "none".to_string()),
        candidates.len()
    )))
}

/// Find the model file: the configured file, otherwise the first `*.gguf`
/// found under the configured directory and the search directories.
pub fn resolve_model(configured: Option<&Path>, search_dirs: &[PathBuf]) -> AppResult<PathBuf> {
    if let Some(path) = configured {
        if path.is_file() {
            return Ok(path.to_path_buf());
        }
    }

    let dirs = configured
        .filter(|p| p.is_dir())
        .into_iter()
        .chain(search_dirs.iter().map(PathBuf::as_path));

    for dir in dirs {
        let found = WalkDir::new(dir)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .find(|e| {
                e.file_type().is_file()
                    && e.path().extension().and_then(|s| s.to_str()) == Some("gguf")
            });
        if let Some(entry) = found {
            return Ok(entry.into_path());
        }
    }

    Err(AppError::BackendUnavailable(format!(
        "No GGUF model found (configured: {}, searched: {:?})",
        configured
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "none".to_string()),
        search_dirs
    )))
}

fn find_in_dir(dir: &Path) -> Option<PathBuf> {
    known_in_dir(dir).or_else(|| llama_prefixed_in_dir(dir))
}

fn known_in_dir(dir: &Path) -> Option<PathBuf> {
    KNOWN_BINARIES
        .iter()
        .map(|name| dir.join(name))
        .find(|p| is_executable(p))
}

fn llama_prefixed_in_dir(dir: &Path) -> Option<PathBuf> {
    if !dir.is_dir() {
        return None;
    }
    WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .find(|e| e.file_name().to_string_lossy().starts_with("llama-") && is_executable(e.path()))
        .map(|e| e.into_path())
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path)
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(dir: &Path, name: &str, exec: bool) -> PathBuf {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&path, "#!/bin/sh\n").unwrap();
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = if exec { 0o755 } else { 0o644 };
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(mode)).unwrap();
        }
        #[cfg(not(unix))]
        let _ = exec;
        path
    }

    #[test]
    fn test_default_strategies_follow_binary_name() {
        assert_eq!(
            default_strategies(Path::new("/bin/llama-simple")),
            vec![InvocationStrategy::Positional, InvocationStrategy::PromptFlag]
        );
        assert_eq!(
            default_strategies(Path::new("/bin/llama-cli")),
            vec![InvocationStrategy::PromptFlag, InvocationStrategy::Positional]
        );
    }

    #[test]
    fn test_configured_executable_wins() {
        let dir = TempDir::new().unwrap();
        let bin = touch(dir.path(), "custom-llama", true);
        let candidate = touch(dir.path(), "other/llama-cli", true);
        assert_eq!(resolve_binary(Some(&bin), &[candidate]).unwrap(), bin);
    }

    #[test]
    fn test_directory_uses_known_names_in_order() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "llama-simple", true);
        let cli = touch(dir.path(), "llama-cli", true);
        assert_eq!(resolve_binary(Some(dir.path()), &[]).unwrap(), cli);
    }

    #[cfg(unix)]
    #[test]
    fn test_non_executable_is_skipped() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "llama-cli", false);
        let simple = touch(dir.path(), "llama-simple", true);
        assert_eq!(resolve_binary(Some(dir.path()), &[]).unwrap(), simple);
    }

    #[test]
    fn test_candidates_then_parent() {
        let dir = TempDir::new().unwrap();
        let candidate = touch(dir.path(), "a/main", true);
        let missing = dir.path().join("b/llama-missing");
        assert_eq!(
            resolve_binary(Some(&missing), &[dir.path().join("nope"), candidate.clone()]).unwrap(),
            candidate
        );

        let sibling = touch(dir.path(), "b/llama", true);
        assert_eq!(resolve_binary(Some(&missing), &[]).unwrap(), sibling);
    }

    #[test]
    fn test_model_configured_file_then_search() {
        let dir = TempDir::new().unwrap();
        let model = touch(dir.path(), "explicit.bin", false);
        assert_eq!(resolve_model(Some(&model), &[]).unwrap(), model);

        let models = dir.path().join("models");
        touch(&models, "b/second.gguf", false);
        let first = touch(&models, "a/first.gguf", false);
        touch(&models, "a/readme.txt", false);
        assert_eq!(
            resolve_model(Some(&dir.path().join("gone.gguf")), &[models]).unwrap(),
            first
        );
    }

    #[test]
    fn test_no_model_is_backend_unavailable() {
        let dir = TempDir::new().unwrap();
        let err = resolve_model(None, &[dir.path().to_path_buf()]).unwrap_err();
        assert_eq!(err.kind(), "backend_unavailable");
    }
}
