//! Template loading utilities
//!
//! Template files are YAML documents named `*.tpl.yaml`. Parse failures are
//! reported as [`YamlSyntaxError`] diagnostics pointing into the file.

use miette::{IntoDiagnostic, Result, WrapErr};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::entities::Template;
use crate::yaml::YamlSyntaxError;

/// File suffix of template files found by directory scans
pub const TEMPLATE_SUFFIX: &str = ".tpl.yaml";

/// Parse template YAML, attributing errors to `filename`
pub fn parse_template(content: &str, filename: &str) -> std::result::Result<Template, YamlSyntaxError> {
    serde_yml::from_str(content).map_err(|e| YamlSyntaxError::from_serde_error(&e, content, filename))
}

/// Load a single template file
pub fn load_template(path: &Path) -> Result<Template> {
    let content = fs::read_to_string(path)
        .into_diagnostic()
        .wrap_err_with(|| format!("failed to read {}", path.display()))?;
    let template = parse_template(&content, &path.display().to_string())?;
    tracing::debug!(path = %path.display(), relations = template.relations.len(), "template loaded");
    Ok(template)
}

/// Whether a path names a template file
pub fn is_template_file(path: &Path) -> bool {
    path.to_string_lossy().ends_with(TEMPLATE_SUFFIX)
}

/// Expand paths - a directory contributes every template file below it,
/// a file is taken as given
pub fn expand_paths(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for path in paths {
        if path.is_dir() {
            for entry in WalkDir::new(path)
                .into_iter()
                .filter_entry(|e| {
                    // Skip hidden directories such as .git and .bomcalc
                    let name = e.file_name().to_string_lossy();
                    !name.starts_with('.') || e.depth() == 0
                })
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file())
            {
                if is_template_file(entry.path()) {
                    files.push(entry.path().to_path_buf());
                }
            }
        } else if path.exists() {
            files.push(path.clone());
        }
    }

    files.sort();
    files
}
