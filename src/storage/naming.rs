/// Project name normalization and address validation
use crate::error::{IndexError, IndexResult};
use crate::storage::digest::DIGEST_SUFFIX;

/// File extensions recognised as package artifacts
pub const ARTIFACT_EXTENSIONS: &[&str] = &[".whl", ".tar.gz"];

/// Normalize a project name (PEP 503).
///
/// Runs of `-`, `_` and `.` collapse to a single `-` and the result is lowercased.
pub fn normalize_project_name(name: &str) -> String {
    let mut normalized = String::with_capacity(name.len());
    let mut in_separator_run = false;

    for c in name.chars() {
        if matches!(c, '-' | '_' | '.') {
            if !in_separator_run {
                normalized.push('-');
                in_separator_run = true;
            }
        } else {
            normalized.push(c.to_ascii_lowercase());
            in_separator_run = false;
        }
    }

    normalized
}

/// Validate a single address segment (project, version or filename).
///
/// Segments map directly onto directory and blob name components, so anything
/// that could escape its parent or collide with hidden entries is rejected.
pub fn validate_segment(kind: &str, value: &str) -> IndexResult<()> {
    if value.is_empty() {
        return Err(IndexError::Validation(format!("{} cannot be empty", kind)));
    }
    if value.starts_with('.') {
        return Err(IndexError::Validation(format!(
            "{} cannot start with '.': {}",
            kind, value
        )));
    }
    if value.contains(['/', '\\', '\0']) {
        return Err(IndexError::Validation(format!(
            "{} contains a path separator: {}",
            kind, value
        )));
    }
    Ok(())
}

/// Validate and normalize a project name
pub fn project_segment(project: &str) -> IndexResult<String> {
    validate_segment("Project name", project)?;
    let normalized = normalize_project_name(project);
    validate_segment("Project name", &normalized)?;
    Ok(normalized)
}

/// Validate an artifact filename; digest sidecar names are reserved
pub fn validate_filename(filename: &str) -> IndexResult<()> {
    validate_segment("Filename", filename)?;
    if filename.ends_with(DIGEST_SUFFIX) {
        return Err(IndexError::Validation(format!(
            "Filename cannot end with '{}': {}",
            DIGEST_SUFFIX, filename
        )));
    }
    Ok(())
}

/// Whether an entry name is hidden (dotfile)
pub fn is_hidden(name: &str) -> bool {
    name.starts_with('.')
}

/// Whether a filename is a listable artifact (not a sidecar, not hidden, known extension)
pub fn is_artifact(filename: &str) -> bool {
    !is_hidden(filename)
        && !filename.ends_with(DIGEST_SUFFIX)
        && ARTIFACT_EXTENSIONS.iter().any(|ext| filename.ends_with(ext))
}
