#![allow(clippy::missing_docs_in_private_items)]

pub mod auth;
mod client;
pub mod types;

use async_trait::async_trait;
use common::error::GatewayError;

pub use auth::TokenSource;
pub use client::{attachment_filename, RemoteGateway};
use types::{Artifact, CancelReport, Download, StatusMap, SubmitParams, SubmitResult};

/// Operations offered by the batch service.
///
/// Every method either returns a typed payload or a [`GatewayError`];
/// transport failures are never passed through raw.
#[async_trait]
pub trait ControlPlane: Send + Sync {
    async fn submit(
        &self,
        job_id: &str,
        artifact: Artifact,
        params: &SubmitParams,
    ) -> Result<SubmitResult, GatewayError>;

    /// One batched lookup for all tracked jobs. Empty id lists return an
    /// empty map without contacting the service.
    async fn query_status(
        &self,
        request_ids: &[String],
        instance_ids: &[String],
    ) -> Result<StatusMap, GatewayError>;

    async fn cancel(&self, request_id: &str, instance_id: &str) -> Result<CancelReport, GatewayError>;

    async fn service_status(&self) -> Result<serde_json::Value, GatewayError>;

    async fn download(&self, job_id: &str, filename: &str) -> Result<Download, GatewayError>;
}
