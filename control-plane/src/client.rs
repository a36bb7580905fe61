use std::time::Duration;

use async_trait::async_trait;
use common::{error::GatewayError, utils::service_url::join_url_parts};
use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_DISPOSITION, EXPIRES},
    multipart::{Form, Part},
    Client, Method, RequestBuilder, Response,
};
use serde::de::DeserializeOwned;
use tracing::{debug, error, info};
use url::Url;

use crate::{
    auth::TokenSource,
    types::{Artifact, CancelReport, Download, StatusMap, SubmitParams, SubmitResult},
    ControlPlane,
};

/// HTTP client for the batch service.
#[derive(Debug, Clone)]
pub struct RemoteGateway {
    client: Client,
    base: Url,
    token: TokenSource,
}

impl RemoteGateway {
    pub fn new(base: Url, token: TokenSource, timeout: Duration) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| GatewayError::Unreachable(format!("failed to build client: {err}")))?;

        Ok(Self {
            client,
            base,
            token,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn endpoint(&self, path: &str) -> Result<Url, GatewayError> {
        let raw = join_url_parts(&[self.base.as_str(), path]);
        Url::parse(&raw)
            .map_err(|err| GatewayError::Unreachable(format!("invalid endpoint {raw}: {err}")))
    }

    /// Starts a request with the auth header attached, failing before any
    /// I/O when no credential is available.
    fn request(&self, method: Method, url: Url) -> Result<RequestBuilder, GatewayError> {
        let auth = self.token.header_value().ok_or_else(|| {
            GatewayError::AuthUnavailable("no token in the configured source".to_string())
        })?;
        debug!(%method, %url, "Sending control plane request");
        Ok(self.client.request(method, url).header(AUTHORIZATION, auth))
    }

    async fn send(request: RequestBuilder) -> Result<Response, GatewayError> {
        request
            .send()
            .await
            .map_err(|err| GatewayError::Unreachable(err.to_string()))
    }

    async fn body_text(response: Response) -> Result<String, GatewayError> {
        response
            .text()
            .await
            .map_err(|err| GatewayError::Unreachable(err.to_string()))
    }

    /// Sends and decodes a JSON answer; any non-2xx status becomes
    /// [`GatewayError::Remote`] carrying the body.
    async fn fetch_json<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, GatewayError> {
        let response = Self::send(request).await?;
        let status = response.status();
        let url = response.url().clone();
        let body = Self::body_text(response).await?;

        if !status.is_success() {
            error!(%url, status = status.as_u16(), %body, "Control plane responded with an error");
            return Err(GatewayError::Remote {
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_str(&body).map_err(|err| GatewayError::Decode(err.to_string()))
    }
}

#[async_trait]
impl ControlPlane for RemoteGateway {
    async fn submit(
        &self,
        job_id: &str,
        artifact: Artifact,
        params: &SubmitParams,
    ) -> Result<SubmitResult, GatewayError> {
        let url = self.endpoint("/submit_job")?;
        let request = self.request(Method::POST, url.clone())?;

        let mut part_headers = HeaderMap::new();
        part_headers.insert(EXPIRES, HeaderValue::from_static("0"));
        let file = Part::bytes(artifact.contents)
            .file_name(artifact.file_name)
            .mime_str(mime::TEXT_PLAIN.as_ref())
            .map_err(|err| GatewayError::Decode(err.to_string()))?
            .headers(part_headers);

        let form = Form::new()
            .text("job_id", job_id.to_string())
            .text("name", params.name.clone())
            .text("path", params.path.clone())
            .text("instance_type", params.instance_type.clone())
            .text("shared_dir", params.shared_dir.clone())
            .part("file", file);

        info!(%job_id, %url, path = %params.path, "Submitting job to control plane");
        let response = Self::send(request.multipart(form)).await?;
        let status = response.status();
        let body = Self::body_text(response).await?;

        if !status.is_success() {
            // Keep the remote payload as-is so users see the cloud's own message.
            let detail = serde_json::from_str(&body).unwrap_or(serde_json::Value::String(body));
            error!(%job_id, status = status.as_u16(), %detail, "Control plane failed to start the job");
            return Err(GatewayError::Provisioning {
                status: status.as_u16(),
                detail,
            });
        }

        serde_json::from_str(&body).map_err(|err| GatewayError::Decode(err.to_string()))
    }

    async fn query_status(
        &self,
        request_ids: &[String],
        instance_ids: &[String],
    ) -> Result<StatusMap, GatewayError> {
        if request_ids.is_empty() && instance_ids.is_empty() {
            return Ok(StatusMap::new());
        }

        let mut url = self.endpoint("/job")?;
        url.query_pairs_mut()
            .append_pair("request_ids", &request_ids.join(","))
            .append_pair("instance_ids", &instance_ids.join(","));

        info!(jobs = instance_ids.len(), "Asking control plane for job statuses");
        let request = self.request(Method::GET, url)?;
        Self::fetch_json(request).await
    }

    async fn cancel(&self, request_id: &str, instance_id: &str) -> Result<CancelReport, GatewayError> {
        let mut url = self.endpoint("/job")?;
        url.query_pairs_mut()
            .append_pair("request_id", request_id)
            .append_pair("instance_id", instance_id);

        info!(%request_id, %instance_id, "Cancelling job at control plane");
        let request = self.request(Method::DELETE, url)?;
        Self::fetch_json(request).await
    }

    async fn service_status(&self) -> Result<serde_json::Value, GatewayError> {
        let url = self.endpoint("/status")?;
        let request = self.request(Method::GET, url)?;
        Self::fetch_json(request).await
    }

    async fn download(&self, job_id: &str, filename: &str) -> Result<Download, GatewayError> {
        let mut url = self.endpoint("/download")?;
        url.query_pairs_mut()
            .append_pair("job_id", job_id)
            .append_pair("filename", filename);

        info!(%job_id, %filename, "Downloading job result");
        let request = self.request(Method::GET, url)?;
        let response = Self::send(request).await?;
        let status = response.status();

        if !status.is_success() {
            let body = Self::body_text(response).await?;
            error!(%job_id, status = status.as_u16(), %body, "Unable to download the result");
            return Err(GatewayError::Remote {
                status: status.as_u16(),
                body,
            });
        }

        let filename = response
            .headers()
            .get(CONTENT_DISPOSITION)
            .and_then(|value| value.to_str().ok())
            .and_then(attachment_filename);
        let contents = response
            .bytes()
            .await
            .map_err(|err| GatewayError::Unreachable(err.to_string()))?
            .to_vec();

        Ok(Download { filename, contents })
    }
}

/// Extracts `filename` from an `attachment` content disposition.
pub fn attachment_filename(disposition: &str) -> Option<String> {
    let mut parts = disposition.split(';').map(str::trim);
    if !parts.next()?.eq_ignore_ascii_case("attachment") {
        return None;
    }

    parts
        .filter_map(|param| param.split_once('='))
        .find(|(key, _)| key.trim().eq_ignore_ascii_case("filename"))
        .map(|(_, value)| value.trim().trim_matches('"').to_string())
        .filter(|name| !name.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attachment_filename_is_extracted() {
        assert_eq!(
            attachment_filename("attachment; filename=\"result.tar.gz\"").as_deref(),
            Some("result.tar.gz")
        );
        assert_eq!(
            attachment_filename("Attachment;filename=out.zip").as_deref(),
            Some("out.zip")
        );
    }

    #[test]
    fn inline_disposition_has_no_filename() {
        assert_eq!(attachment_filename("inline; filename=\"x\""), None);
        assert_eq!(attachment_filename("attachment"), None);
    }

    #[test]
    fn endpoints_extend_the_base_path() {
        let gateway = RemoteGateway::new(
            Url::parse("http://hub:12345/services/batch").expect("url"),
            TokenSource::Fixed(None),
            Duration::from_secs(1),
        )
        .expect("gateway");

        assert_eq!(
            gateway.endpoint("/job").expect("endpoint").as_str(),
            "http://hub:12345/services/batch/job"
        );
    }
}
