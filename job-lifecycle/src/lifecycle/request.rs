use std::{
    ffi::OsStr,
    path::{Component, Path, PathBuf},
};

use common::error::AppError;
use serde::Deserialize;

/// Artifact suffixes the batch service knows how to run, compared without
/// regard to case.
pub const ALLOWED_SUFFIXES: [&str; 5] = ["ipynb", "sh", "py", "r", "rmd"];

/// A user's request to run a file as a batch job.
#[derive(Debug, Clone, Deserialize)]
pub struct SubmitJobRequest {
    pub name: String,
    /// Artifact path relative to the server root.
    pub path: String,
    pub instance_type: String,
    #[serde(default)]
    pub shared_dir: String,
    /// Accepted for compatibility with existing clients; not sent anywhere.
    #[serde(default)]
    pub max_coins_per_hour: Option<serde_json::Value>,
}

/// Checks a submission against the file system and returns the absolute
/// artifact path.
pub(crate) fn validate(root: &Path, request: &SubmitJobRequest) -> Result<PathBuf, AppError> {
    if request.name.trim().is_empty() {
        return Err(AppError::validation("name", "must not be empty"));
    }
    if request.instance_type.trim().is_empty() {
        return Err(AppError::validation("instance_type", "must not be empty"));
    }

    let artifact = resolve_under(root, "path", &request.path)?;
    if !artifact.is_file() {
        return Err(AppError::validation(
            "path",
            format!("the file does not exist: {}", request.path),
        ));
    }

    let suffix_allowed = artifact
        .extension()
        .and_then(OsStr::to_str)
        .is_some_and(|ext| ALLOWED_SUFFIXES.iter().any(|s| s.eq_ignore_ascii_case(ext)));
    if !suffix_allowed {
        return Err(AppError::validation(
            "path",
            format!(
                "unsupported suffix, a batch job takes a notebook or script (.ipynb, .sh, .py, .r, .rmd): {}",
                request.path
            ),
        ));
    }

    if !request.shared_dir.trim().is_empty() {
        let shared = resolve_under(root, "shared_dir", &request.shared_dir)?;
        if !shared.is_dir() {
            return Err(AppError::validation(
                "shared_dir",
                format!("not an existing directory: {}", request.shared_dir),
            ));
        }
    }

    Ok(artifact)
}

fn resolve_under(root: &Path, field: &str, relative: &str) -> Result<PathBuf, AppError> {
    let relative = Path::new(relative.trim());
    if relative.as_os_str().is_empty() {
        return Err(AppError::validation(field, "must not be empty"));
    }
    if relative
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
    {
        return Err(AppError::validation(
            field,
            format!("must be relative to the server root: {}", relative.display()),
        ));
    }
    Ok(root.join(relative))
}
