use api_state::ApiState;
use axum::{
    extract::FromRef,
    middleware::from_fn_with_state,
    routing::{delete, get},
    Router,
};
use middleware_api_auth::api_auth;
use routes::{
    hub::hub_status,
    jobs::{cancel_job, download_result, list_jobs, submit_job},
    liveness::live,
    readiness::ready,
};

pub mod api_state;
pub mod error;
mod middleware_api_auth;
mod routes;

/// Router for API functionality, version 1
pub fn api_routes_v1<S>(app_state: &ApiState) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
    ApiState: FromRef<S>,
{
    // Public, unauthenticated endpoints (for k8s/systemd health checks)
    let public = Router::new()
        .route("/ready", get(ready))
        .route("/live", get(live));

    // Job endpoints, guarded when an API key is configured
    let protected = Router::new()
        .route("/jobs", get(list_jobs).post(submit_job))
        .route("/jobs/{job_id}", delete(cancel_job))
        .route("/jobs/{job_id}/download", get(download_result))
        .route("/hub/status", get(hub_status))
        .route_layer(from_fn_with_state(app_state.clone(), api_auth));

    public.merge(protected)
}
