use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::{api_state::ApiState, error::ApiError};

/// Rejects requests without the configured API key. Without a configured
/// key every request passes.
pub async fn api_auth(
    State(state): State<ApiState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if let Some(expected) = state.config.api_key.as_deref().filter(|key| !key.is_empty()) {
        let api_key = extract_api_key(&request)
            .ok_or_else(|| ApiError::Unauthorized("You have to be authenticated".to_string()))?;

        if api_key != expected {
            return Err(ApiError::Unauthorized(
                "You have to be authenticated".to_string(),
            ));
        }
    }

    Ok(next.run(request).await)
}

fn extract_api_key(request: &Request) -> Option<String> {
    request
        .headers()
        .get("X-API-Key")
        .and_then(|v| v.to_str().ok())
        .or_else(|| {
            request
                .headers()
                .get("Authorization")
                .and_then(|v| v.to_str().ok())
                .and_then(|auth| {
                    auth.strip_prefix("token ")
                        .or_else(|| auth.strip_prefix("Bearer "))
                        .map(str::trim)
                })
        })
        .map(String::from)
}
