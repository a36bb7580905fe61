mod output;
mod request;

pub use output::output_dir;
pub use request::{SubmitJobRequest, ALLOWED_SUFFIXES};

use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use chrono::Utc;
use common::{
    error::{AppError, GatewayError},
    storage::{
        db::JobStore,
        types::{job_info::JobInfo, job_metadata::JobMetadata, job_status::JobStatus},
    },
    utils::config::AppConfig,
};
use control_plane::{
    types::{Artifact, CancelReport, StatusMap, SubmitParams, SubmitResult},
    ControlPlane, RemoteGateway, TokenSource,
};
use serde::Serialize;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use self::{output::local_file_name, request::validate};

/// Outcome of a cancellation. The local record is gone whenever this is
/// returned; `remote` and `remote_error` describe what the batch service said.
#[derive(Debug, Clone, Serialize)]
pub struct CancelSummary {
    pub job_id: String,
    pub remote: Option<CancelReport>,
    pub remote_error: Option<String>,
    pub removed: usize,
}

/// Drives jobs through submit, observe and cancel.
///
/// Without a control plane the manager runs in dry-run mode: nothing leaves
/// the process and remote handles are made up.
#[allow(clippy::module_name_repetitions)]
pub struct JobLifecycleManager {
    db_path: PathBuf,
    server_root: PathBuf,
    control_plane: Option<Arc<dyn ControlPlane>>,
}

impl JobLifecycleManager {
    pub fn new(
        db_path: impl Into<PathBuf>,
        server_root: impl Into<PathBuf>,
        control_plane: Option<Arc<dyn ControlPlane>>,
    ) -> Self {
        Self {
            db_path: db_path.into(),
            server_root: server_root.into(),
            control_plane,
        }
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, AppError> {
        let control_plane: Option<Arc<dyn ControlPlane>> = if config.dry_run_forced() {
            info!("Dry-run forced by configuration");
            None
        } else {
            match config
                .service_base_url()
                .map_err(|err| AppError::Config(format!("invalid batch service URL: {err}")))?
            {
                Some(base) => {
                    info!(%base, "Using batch service");
                    let gateway = RemoteGateway::new(
                        base,
                        TokenSource::Environment(config.auth_token_env.clone()),
                        Duration::from_secs(config.request_timeout_secs),
                    )?;
                    Some(Arc::new(gateway))
                }
                None => {
                    warn!("No hub or batch service URL configured, running in dry-run mode");
                    None
                }
            }
        };

        Ok(Self::new(config.db_path(), config.server_root(), control_plane))
    }

    pub fn is_dry_run(&self) -> bool {
        self.control_plane.is_none()
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Opens the store on a blocking thread, runs `op` and closes it again.
    async fn with_store<T, F>(&self, op: F) -> Result<T, AppError>
    where
        F: FnOnce(&mut JobStore) -> Result<T, AppError> + Send + 'static,
        T: Send + 'static,
    {
        let path = self.db_path.clone();
        tokio::task::spawn_blocking(move || {
            let mut store = JobStore::open(&path)?;
            let result = op(&mut store);
            let closed = store.close();
            let value = result?;
            closed?;
            Ok(value)
        })
        .await?
    }

    /// Opens the store once so schema problems surface at startup.
    pub async fn check_store(&self) -> Result<(), AppError> {
        self.with_store(|_| Ok(())).await
    }

    #[tracing::instrument(skip_all, fields(dry_run = self.is_dry_run()))]
    pub async fn list_jobs(&self) -> Result<Vec<JobInfo>, AppError> {
        let records = self.with_store(|store| store.list()).await?;
        Ok(self.resolve_all(records).await?)
    }

    /// One batched status lookup for `records`; no lookup in dry-run mode or
    /// when there is nothing to look up.
    async fn resolve_all(&self, records: Vec<JobMetadata>) -> Result<Vec<JobInfo>, GatewayError> {
        let Some(control_plane) = &self.control_plane else {
            debug!(jobs = records.len(), "Dry-run, reporting every job as opened");
            return Ok(records.into_iter().map(JobInfo::dry_run).collect());
        };

        if records.is_empty() {
            return Ok(Vec::new());
        }

        let request_ids: Vec<String> = records.iter().map(|r| r.request_id.clone()).collect();
        let instance_ids: Vec<String> = records.iter().map(|r| r.instance_id.clone()).collect();
        let statuses = control_plane.query_status(&request_ids, &instance_ids).await?;

        Ok(records
            .into_iter()
            .map(|meta| resolve_info(meta, &statuses))
            .collect())
    }

    /// Submits a job and returns its entry.
    pub async fn submit_job(&self, request: SubmitJobRequest) -> Result<JobInfo, AppError> {
        let (submitted, _) = self.submit_and_list(request).await?;
        Ok(submitted)
    }

    /// Submits a job and returns its entry together with the refreshed
    /// listing, at the cost of a single status lookup.
    ///
    /// Once the record is stored this never fails: a status lookup that
    /// errors leaves every job `UNKNOWN`.
    #[tracing::instrument(
        skip_all,
        fields(name = %request.name, path = %request.path, instance_type = %request.instance_type)
    )]
    pub async fn submit_and_list(
        &self,
        request: SubmitJobRequest,
    ) -> Result<(JobInfo, Vec<JobInfo>), AppError> {
        let meta = self.record_submission(request).await?;

        let jobs = match self.with_store(|store| store.list()).await {
            Ok(records) => match self.resolve_all(records.clone()).await {
                Ok(jobs) => jobs,
                Err(err) => {
                    warn!(error = %err, "Job submitted but its status is unavailable");
                    records
                        .into_iter()
                        .map(|meta| JobInfo::new(meta, JobStatus::Unknown, String::new()))
                        .collect()
                }
            },
            Err(err) => {
                warn!(error = %err, "Job submitted but the job list could not be read back");
                Vec::new()
            }
        };

        let submitted = match jobs.iter().find(|info| info.job_id() == meta.job_id) {
            Some(info) => info.clone(),
            None if self.is_dry_run() => JobInfo::dry_run(meta),
            None => JobInfo::new(meta, JobStatus::Unknown, String::new()),
        };
        let jobs = if jobs.is_empty() {
            vec![submitted.clone()]
        } else {
            jobs
        };

        Ok((submitted, jobs))
    }

    /// Validates, starts the job remotely (or invents handles in dry-run
    /// mode) and persists the record.
    async fn record_submission(&self, request: SubmitJobRequest) -> Result<JobMetadata, AppError> {
        let artifact_path = validate(&self.server_root, &request)?;
        if let Some(limit) = &request.max_coins_per_hour {
            debug!(%limit, "Spending limit received but not enforced");
        }

        let job_id = Uuid::new_v4().to_string();
        let handles = match &self.control_plane {
            None => {
                debug!(%job_id, "Dry-run, inventing remote handles");
                SubmitResult {
                    launch_time: Utc::now(),
                    request_id: Uuid::new_v4().to_string(),
                    instance_id: Uuid::new_v4().to_string(),
                }
            }
            Some(control_plane) => {
                let contents = tokio::fs::read(&artifact_path).await?;
                let artifact = Artifact {
                    file_name: local_file_name(
                        artifact_path.file_name().and_then(|name| name.to_str()),
                        &request.path,
                    ),
                    contents,
                };
                let params = SubmitParams {
                    name: request.name.clone(),
                    path: request.path.clone(),
                    instance_type: request.instance_type.clone(),
                    shared_dir: request.shared_dir.clone(),
                };
                control_plane.submit(&job_id, artifact, &params).await?
            }
        };

        let meta = JobMetadata {
            job_id: job_id.clone(),
            name: request.name,
            file_path: request.path,
            timestamp: handles.launch_time,
            request_id: handles.request_id,
            instance_id: handles.instance_id,
            instance_type: request.instance_type,
            shared_dir: request.shared_dir,
            extra: String::new(),
        };
        info!(
            %job_id,
            request_id = %meta.request_id,
            instance_id = %meta.instance_id,
            "Recording submitted job"
        );

        let stored = meta.clone();
        if let Err(err) = self.with_store(move |store| store.add(&stored)).await {
            if !self.is_dry_run() {
                error!(
                    %job_id,
                    request_id = %meta.request_id,
                    instance_id = %meta.instance_id,
                    error = %err,
                    "Job is running remotely but could not be recorded; it must be cleaned up by hand"
                );
            }
            return Err(err);
        }

        Ok(meta)
    }

    /// Asks the batch service to stop the job, then forgets it locally no
    /// matter what the service answered.
    #[tracing::instrument(skip(self))]
    pub async fn cancel_job(&self, job_id: &str) -> Result<CancelSummary, AppError> {
        let id = job_id.to_string();
        let meta = self.with_store(move |store| store.get(&id)).await?;

        let (remote, remote_error) = match &self.control_plane {
            None => {
                debug!("Dry-run, skipping remote cancellation");
                (None, None)
            }
            Some(control_plane) => {
                match control_plane
                    .cancel(&meta.request_id, &meta.instance_id)
                    .await
                {
                    Ok(report) => {
                        if report.is_degraded() {
                            warn!(?report, "Batch service reported a partial cancellation");
                        } else {
                            info!("Batch service cancelled the job");
                        }
                        (Some(report), None)
                    }
                    Err(err) => {
                        warn!(error = %err, "Remote cancellation failed, dropping the job anyway");
                        (None, Some(err.to_string()))
                    }
                }
            }
        };

        let id = meta.job_id.clone();
        let removed = self.with_store(move |store| store.delete(&id)).await?;

        Ok(CancelSummary {
            job_id: meta.job_id,
            remote,
            remote_error,
            removed,
        })
    }

    /// Health payload of the batch service, passed through as-is.
    pub async fn hub_status(&self) -> Result<serde_json::Value, AppError> {
        match &self.control_plane {
            None => Ok(serde_json::json!({ "data": "dry-run" })),
            Some(control_plane) => Ok(control_plane.service_status().await?),
        }
    }

    /// Fetches a job's result into its output directory and returns the
    /// written file.
    #[tracing::instrument(skip(self))]
    pub async fn download_result(&self, job_id: &str) -> Result<PathBuf, AppError> {
        let id = job_id.to_string();
        let meta = self.with_store(move |store| store.get(&id)).await?;

        let Some(control_plane) = &self.control_plane else {
            return Err(AppError::DryRun("results cannot be downloaded".to_string()));
        };

        let artifact_name = local_file_name(Some(&meta.file_path), &meta.file_path);
        let download = control_plane.download(&meta.job_id, &artifact_name).await?;

        let dir = output_dir(&self.server_root, &meta);
        tokio::fs::create_dir_all(&dir).await?;
        let target = dir.join(local_file_name(download.filename.as_deref(), &artifact_name));
        tokio::fs::write(&target, &download.contents).await?;

        info!(path = %target.display(), bytes = download.contents.len(), "Stored job result");
        Ok(target)
    }
}

fn resolve_info(meta: JobMetadata, statuses: &StatusMap) -> JobInfo {
    match statuses.get(&meta.instance_id) {
        Some(report) => {
            let console = report.console.clone().unwrap_or_default();
            let status = JobStatus::resolve(&report.request, &report.instance, &console);
            if status == JobStatus::Unknown {
                debug!(
                    job_id = %meta.job_id,
                    request = %report.request,
                    instance = %report.instance,
                    "Unrecognised state pair"
                );
            }
            JobInfo::new(meta, status, console)
        }
        None => {
            warn!(
                job_id = %meta.job_id,
                instance_id = %meta.instance_id,
                "Batch service did not report on job"
            );
            JobInfo::new(meta, JobStatus::Unknown, String::new())
        }
    }
}
