use std::{sync::Arc, time::Duration};

use api_router::{api_routes_v1, api_state::ApiState};
use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, StatusCode},
    Router,
};
use common::utils::config::AppConfig;
use control_plane::{ControlPlane, RemoteGateway, TokenSource};
use job_lifecycle::JobLifecycleManager;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;
use url::Url;

/// Server root with a couple of artifacts plus a separate data directory.
pub struct TestEnv {
    pub root: TempDir,
    pub data: TempDir,
}

impl TestEnv {
    pub fn new() -> Self {
        let root = TempDir::new().expect("Failed to create server root");
        std::fs::create_dir_all(root.path().join("notebooks")).expect("Failed to create dir");
        std::fs::write(root.path().join("notebooks/train.ipynb"), b"{\"cells\":[]}")
            .expect("Failed to write notebook");
        std::fs::write(root.path().join("readme.txt"), b"not a job").expect("Failed to write");
        std::fs::create_dir_all(root.path().join("shared")).expect("Failed to create dir");

        Self {
            root,
            data: TempDir::new().expect("Failed to create data dir"),
        }
    }

    /// Configuration with no hub URL, so the service runs in dry-run mode.
    pub fn config(&self) -> AppConfig {
        AppConfig {
            server_root_dir: self.root.path().to_string_lossy().into_owned(),
            data_dir: self.data.path().to_string_lossy().into_owned(),
            http_port: 0,
            ..AppConfig::default()
        }
    }

    pub fn dry_run_app(&self) -> Router {
        let state = ApiState::new(&self.config()).expect("Failed to build api state");
        build_app(&state)
    }

    /// App talking to a batch service at `base` with a fixed token.
    pub fn live_app(&self, base: &str, config: &AppConfig) -> Router {
        let gateway = RemoteGateway::new(
            Url::parse(base).expect("Invalid service url"),
            TokenSource::Fixed(Some("test-token".to_string())),
            Duration::from_secs(5),
        )
        .expect("Failed to build gateway");
        let control_plane: Arc<dyn ControlPlane> = Arc::new(gateway);
        let manager = JobLifecycleManager::new(config.db_path(), config.server_root(), Some(control_plane));
        build_app(&ApiState::with_manager(config, manager))
    }
}

pub fn build_app(state: &ApiState) -> Router {
    Router::new()
        .nest("/api/v1", api_routes_v1(state))
        .with_state(state.clone())
}

/// Sends one request through the router and decodes the JSON answer.
pub async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    send_with_headers(app, method, uri, body, &[]).await
}

pub async fn send_with_headers(
    app: &Router,
    method: Method,
    uri: &str,
    body: Option<Value>,
    headers: &[(&str, &str)],
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string())),
        None => builder.body(Body::empty()),
    }
    .expect("Failed to build request");

    let response = app
        .clone()
        .oneshot(request)
        .await
        .expect("Router failed to answer");
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Failed to read body");
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("Response is not JSON")
    };

    (status, json)
}
