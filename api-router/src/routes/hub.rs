use axum::{extract::State, response::IntoResponse, Json};

use crate::{api_state::ApiState, error::ApiError};

pub async fn hub_status(State(state): State<ApiState>) -> Result<impl IntoResponse, ApiError> {
    let status = state.manager.hub_status().await?;
    Ok(Json(status))
}
