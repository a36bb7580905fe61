use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use job_lifecycle::SubmitJobRequest;
use serde_json::json;
use tracing::info;

use crate::{api_state::ApiState, error::ApiError};

pub async fn list_jobs(State(state): State<ApiState>) -> Result<impl IntoResponse, ApiError> {
    let jobs = state.manager.list_jobs().await?;
    Ok(Json(jobs))
}

/// Submits a job and answers with the refreshed listing.
pub async fn submit_job(
    State(state): State<ApiState>,
    Json(input): Json<SubmitJobRequest>,
) -> Result<impl IntoResponse, ApiError> {
    info!(
        name = %input.name,
        path = %input.path,
        instance_type = %input.instance_type,
        "Received job submission"
    );

    let (submitted, jobs) = state.manager.submit_and_list(input).await?;
    info!(job_id = %submitted.job_id(), status = %submitted.status, "Job submitted");

    Ok(Json(jobs))
}

/// Cancels a job and answers with the refreshed listing.
pub async fn cancel_job(
    State(state): State<ApiState>,
    Path(job_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let summary = state.manager.cancel_job(&job_id).await?;
    info!(
        job_id = %summary.job_id,
        removed = summary.removed,
        remote_error = summary.remote_error.as_deref().unwrap_or(""),
        "Job cancelled"
    );

    let jobs = state.manager.list_jobs().await?;
    Ok(Json(jobs))
}

pub async fn download_result(
    State(state): State<ApiState>,
    Path(job_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let saved = state.manager.download_result(&job_id).await?;
    Ok(Json(json!({ "data": saved.display().to_string() })))
}
