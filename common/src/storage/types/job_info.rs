use serde::{Deserialize, Serialize};

use super::{job_metadata::JobMetadata, job_status::JobStatus};

/// Placeholder console text reported for every job when no control plane
/// is configured.
pub const DRY_RUN_CONSOLE: &str = "---------  OUTPUT -----------";

/// A job record together with its freshly resolved status.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct JobInfo {
    #[serde(flatten)]
    pub metadata: JobMetadata,
    pub status: JobStatus,
    pub console_output: String,
}

impl JobInfo {
    pub fn new(metadata: JobMetadata, status: JobStatus, console_output: impl Into<String>) -> Self {
        Self {
            metadata,
            status,
            console_output: console_output.into(),
        }
    }

    pub fn dry_run(metadata: JobMetadata) -> Self {
        Self::new(metadata, JobStatus::Opened, DRY_RUN_CONSOLE)
    }

    pub fn job_id(&self) -> &str {
        &self.metadata.job_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn serializes_flat() {
        let info = JobInfo::dry_run(JobMetadata {
            job_id: "j-1".into(),
            name: "train".into(),
            file_path: "nb/train.ipynb".into(),
            timestamp: Utc::now(),
            request_id: "sir-1".into(),
            instance_id: "i-1".into(),
            instance_type: "t3.small".into(),
            shared_dir: String::new(),
            extra: String::new(),
        });

        let value = serde_json::to_value(&info).expect("serialize");
        assert_eq!(value["job_id"], "j-1");
        assert_eq!(value["status"], "OPENED");
        assert_eq!(value["console_output"], DRY_RUN_CONSOLE);
    }
}
