use serde::{Deserialize, Serialize};

/// Local view of a job, derived from the control plane's request and
/// instance states on every listing. Never persisted.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Opened,
    Preparing,
    Running,
    Stopping,
    Terminated,
    /// No information yet, or information aged out after termination.
    Empty,
    /// The control plane no longer recognises the resource id.
    Stale,
    Unknown,
}

impl JobStatus {
    /// Maps remote states to a status. The arms are ordered: the first
    /// matching rule wins.
    pub fn resolve(request_state: &str, instance_state: &str, console_output: &str) -> Self {
        match (request_state, instance_state) {
            ("open", _) => JobStatus::Opened,
            (_, "pending") => JobStatus::Preparing,
            (_, "running") => JobStatus::Running,
            (_, "shutting-down" | "stopping") => JobStatus::Stopping,
            (_, "terminated" | "stopped") => JobStatus::Terminated,
            // "info-empty" is seen both before provisioning and long after
            // teardown; leftover console text means the latter.
            (_, "info-empty") if !console_output.is_empty() => JobStatus::Terminated,
            (_, "info-empty") => JobStatus::Empty,
            (_, "notfound-id") => JobStatus::Stale,
            _ => JobStatus::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Opened => "OPENED",
            JobStatus::Preparing => "PREPARING",
            JobStatus::Running => "RUNNING",
            JobStatus::Stopping => "STOPPING",
            JobStatus::Terminated => "TERMINATED",
            JobStatus::Empty => "EMPTY",
            JobStatus::Stale => "STALE",
            JobStatus::Unknown => "UNKNOWN",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_request_wins_over_instance_state() {
        assert_eq!(JobStatus::resolve("open", "running", ""), JobStatus::Opened);
        assert_eq!(JobStatus::resolve("open", "notfound-id", "x"), JobStatus::Opened);
    }

    #[test]
    fn instance_states_map_in_order() {
        let cases = [
            ("active", "pending", "", JobStatus::Preparing),
            ("active", "running", "", JobStatus::Running),
            ("active", "shutting-down", "", JobStatus::Stopping),
            ("closed", "stopping", "", JobStatus::Stopping),
            ("closed", "terminated", "", JobStatus::Terminated),
            ("cancelled", "stopped", "", JobStatus::Terminated),
            ("closed", "info-empty", "bye\n", JobStatus::Terminated),
            ("active", "info-empty", "", JobStatus::Empty),
            ("notfound-id", "notfound-id", "", JobStatus::Stale),
        ];

        for (request, instance, console, expected) in cases {
            assert_eq!(
                JobStatus::resolve(request, instance, console),
                expected,
                "request={request} instance={instance}"
            );
        }
    }

    #[test]
    fn unrecognised_pairs_are_unknown() {
        assert_eq!(JobStatus::resolve("", "", ""), JobStatus::Unknown);
        assert_eq!(JobStatus::resolve("failed", "exploded", "x"), JobStatus::Unknown);
        assert_eq!(JobStatus::resolve("OPEN", "RUNNING", ""), JobStatus::Unknown);
    }

    #[test]
    fn serializes_as_upper_case_name() {
        let json = serde_json::to_string(&JobStatus::Terminated).expect("serialize");
        assert_eq!(json, "\"TERMINATED\"");
        assert_eq!(JobStatus::Stale.to_string(), "STALE");
    }
}
