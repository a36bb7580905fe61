use anyhow::Context;
use api_router::{api_routes_v1, api_state::ApiState};
use axum::{extract::FromRef, Router};
use common::utils::config::get_config;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Set up tracing
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .try_init()
        .ok();

    // Get config
    let config = get_config().context("failed to load configuration")?;

    let api_state = ApiState::new(&config).context("failed to set up the job manager")?;
    if api_state.manager.is_dry_run() {
        warn!("Dry-run mode: jobs are recorded locally and never reach a batch service");
    }

    // Open the store once so schema migrations run (and warn) before serving
    if let Err(e) = api_state.manager.check_store().await {
        error!(
            path = %api_state.manager.db_path().display(),
            "Job store is unusable: {}",
            e
        );
        return Err(e).context("job store is unusable");
    }

    let app = app(api_state);

    info!("Starting server listening on 0.0.0.0:{}", config.http_port);
    let serve_address = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(&serve_address)
        .await
        .with_context(|| format!("failed to bind {serve_address}"))?;
    axum::serve(listener, app).await.context("server error")?;

    Ok(())
}

fn app(api_state: ApiState) -> Router {
    Router::new()
        .nest("/api/v1", api_routes_v1(&api_state))
        .with_state(AppState { api_state })
}

#[derive(Clone, FromRef)]
struct AppState {
    api_state: ApiState,
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::Request, http::StatusCode};
    use common::utils::config::AppConfig;
    use tower::ServiceExt;

    fn smoke_test_config(data_dir: &std::path::Path) -> AppConfig {
        AppConfig {
            data_dir: data_dir.to_string_lossy().into_owned(),
            server_root_dir: data_dir.to_string_lossy().into_owned(),
            http_port: 0,
            ..Default::default()
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn smoke_startup_in_dry_run() {
        let data_dir = tempfile::tempdir().expect("failed to create temp data directory");
        let config = smoke_test_config(data_dir.path());

        let api_state = ApiState::new(&config).expect("failed to build api state");
        assert!(api_state.manager.is_dry_run());
        api_state
            .manager
            .check_store()
            .await
            .expect("store should open");

        let app = app(api_state);

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/api/v1/live")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("router response");
        assert_eq!(response.status(), StatusCode::OK);

        let ready_response = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/ready")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("ready response");
        assert_eq!(ready_response.status(), StatusCode::OK);
    }
}
