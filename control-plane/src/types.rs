use std::collections::HashMap;

use chrono::{DateTime, FixedOffset, NaiveDateTime, Utc};
use serde::{de, Deserialize, Deserializer, Serialize};

/// The file shipped with a submission.
#[derive(Debug, Clone)]
pub struct Artifact {
    pub file_name: String,
    pub contents: Vec<u8>,
}

/// Form fields sent alongside the artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitParams {
    pub name: String,
    /// Artifact path relative to the server root.
    pub path: String,
    pub instance_type: String,
    pub shared_dir: String,
}

/// Handles assigned by the control plane to a freshly provisioned job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitResult {
    #[serde(rename = "LaunchTime", deserialize_with = "lenient_launch_time")]
    pub launch_time: DateTime<Utc>,
    #[serde(rename = "SpotInstanceRequestId")]
    pub request_id: String,
    #[serde(rename = "InstanceId")]
    pub instance_id: String,
}

/// Parses a launch time with or without an offset; offset-less values are
/// taken as UTC.
pub fn parse_launch_time(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = raw.parse::<DateTime<FixedOffset>>() {
        return Some(ts.with_timezone(&Utc));
    }

    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

fn lenient_launch_time<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_launch_time(&raw)
        .ok_or_else(|| de::Error::custom(format!("unrecognised LaunchTime `{raw}`")))
}

/// Remote state of one tracked resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceReport {
    /// open | active | closed | cancelled | failed | notfound-id
    pub request: String,
    /// pending | running | shutting-down | terminated | stopping | stopped |
    /// info-empty | notfound-id
    pub instance: String,
    #[serde(default)]
    pub console: Option<String>,
}

/// Status reports keyed by instance id.
pub type StatusMap = HashMap<String, InstanceReport>;

/// One half of a cancellation answer: either a short message such as
/// `notfound_request_id` / `error ...`, or the raw cloud API response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RemoteAck {
    Message(String),
    Detail(serde_json::Value),
}

impl RemoteAck {
    pub fn is_not_found(&self) -> bool {
        matches!(self, RemoteAck::Message(msg) if msg.starts_with("notfound"))
    }

    pub fn is_error(&self) -> bool {
        matches!(self, RemoteAck::Message(msg) if msg.starts_with("error"))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CancelReport {
    pub cancel: RemoteAck,
    pub terminate: RemoteAck,
}

impl CancelReport {
    /// True when either half reports something other than success.
    pub fn is_degraded(&self) -> bool {
        [&self.cancel, &self.terminate]
            .iter()
            .any(|ack| ack.is_error() || ack.is_not_found())
    }
}

/// A downloaded result file.
#[derive(Debug, Clone)]
pub struct Download {
    /// Name advertised by `Content-Disposition`, when present.
    pub filename: Option<String>,
    pub contents: Vec<u8>,
}
