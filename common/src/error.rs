use thiserror::Error;
use tokio::task::JoinError;

/// Failures of a call to the control plane.
///
/// No transport error type leaks past this enum: callers only ever see one
/// of these variants or a typed success value.
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Control plane credential is not available: {0}")]
    AuthUnavailable(String),
    #[error("Control plane unreachable: {0}")]
    Unreachable(String),
    #[error("Control plane responded with {status}: {body}")]
    Remote { status: u16, body: String },
    #[error("Control plane failed to provision the job ({status}): {detail}")]
    Provisioning {
        status: u16,
        detail: serde_json::Value,
    },
    #[error("Unexpected control plane payload: {0}")]
    Decode(String),
}

// Core internal errors
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Storage(#[from] rusqlite::Error),
    #[error("Schema migration failed: {0}")]
    Migration(String),
    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Duplicate key: {0}")]
    DuplicateKey(String),
    #[error("Validation error: {field}: {message}")]
    Validation { field: String, message: String },
    #[error("Unavailable in dry-run mode: {0}")]
    DryRun(String),
    #[error("Task join error: {0}")]
    Join(#[from] JoinError),
    #[error("IoError: {0}")]
    Io(#[from] std::io::Error),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Internal service error: {0}")]
    InternalError(String),
}

impl AppError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_error_names_the_field() {
        let err = AppError::validation("path", "unsupported suffix");
        assert_eq!(err.to_string(), "Validation error: path: unsupported suffix");
    }

    #[test]
    fn gateway_errors_convert_into_app_errors() {
        let err: AppError = GatewayError::Remote {
            status: 503,
            body: "busy".into(),
        }
        .into();
        assert!(matches!(
            err,
            AppError::Gateway(GatewayError::Remote { status: 503, .. })
        ));
    }
}
