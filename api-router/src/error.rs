use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use common::error::{AppError, GatewayError};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug, Serialize, Clone)]
pub enum ApiError {
    #[error("Internal server error")]
    InternalError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Bad gateway: {0}")]
    BadGateway(String),

    /// The batch service could not start the job; carries its payload as-is.
    #[error("Provisioning failed")]
    ProvisioningFailed(serde_json::Value),
}

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        match err {
            AppError::Validation { field, message } => {
                Self::ValidationError(format!("{field}: {message}"))
            }
            AppError::NotFound(msg) => Self::NotFound(msg),
            AppError::DuplicateKey(_) | AppError::DryRun(_) => Self::Conflict(err.to_string()),
            AppError::Gateway(GatewayError::Provisioning { status, detail }) => {
                tracing::error!(status, %detail, "Job provisioning failed");
                Self::ProvisioningFailed(detail)
            }
            AppError::Gateway(GatewayError::AuthUnavailable(msg)) => {
                tracing::error!("Control plane credential missing: {msg}");
                Self::InternalError("Control plane credential is not available".to_string())
            }
            AppError::Gateway(
                ref gateway @ (GatewayError::Unreachable(_)
                | GatewayError::Remote { .. }
                | GatewayError::Decode(_)),
            ) => {
                tracing::warn!("Control plane call failed: {gateway}");
                Self::BadGateway(gateway.to_string())
            }
            AppError::Storage(_)
            | AppError::Migration(_)
            | AppError::Join(_)
            | AppError::Io(_)
            | AppError::Config(_)
            | AppError::InternalError(_) => {
                tracing::error!("Internal error: {:?}", err);
                Self::InternalError("Internal server error".to_string())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_response) = match self {
            Self::InternalError(message) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorResponse::new(message),
            ),
            Self::ValidationError(message) => (StatusCode::BAD_REQUEST, ErrorResponse::new(message)),
            Self::NotFound(message) => (StatusCode::NOT_FOUND, ErrorResponse::new(message)),
            Self::Unauthorized(message) => (StatusCode::UNAUTHORIZED, ErrorResponse::new(message)),
            Self::Conflict(message) => (StatusCode::CONFLICT, ErrorResponse::new(message)),
            Self::BadGateway(message) => (StatusCode::BAD_GATEWAY, ErrorResponse::new(message)),
            Self::ProvisioningFailed(detail) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorResponse {
                    detail: Some(detail),
                    ..ErrorResponse::new("Failed to start the job".to_string())
                },
            ),
        };

        (status, Json(error_response)).into_response()
    }
}

#[derive(Serialize, Debug)]
struct ErrorResponse {
    error: String,
    status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    detail: Option<serde_json::Value>,
}

impl ErrorResponse {
    fn new(error: String) -> Self {
        Self {
            error,
            status: "error".to_string(),
            detail: None,
        }
    }
}
