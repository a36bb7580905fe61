use chrono::{DateTime, Utc};
use rusqlite::Row;
use serde::{Deserialize, Serialize};

/// A persisted column and the value rows get when the column is introduced
/// by a schema upgrade. `None` means the column cannot be backfilled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    pub name: &'static str,
    pub default: Option<&'static str>,
}

/// Columns of the `jobmeta` table, in `JobMetadata` field order.
pub const COLUMNS: [Column; 9] = [
    Column { name: "job_id", default: None },
    Column { name: "name", default: None },
    Column { name: "file_path", default: None },
    Column { name: "timestamp", default: None },
    Column { name: "request_id", default: None },
    Column { name: "instance_id", default: None },
    Column { name: "instance_type", default: None },
    Column { name: "shared_dir", default: Some("") },
    Column { name: "extra", default: Some("") },
];

/// One submitted job as tracked locally.
///
/// The remote handles (`request_id`, `instance_id`) are written once at
/// submission and never updated; status is always recomputed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct JobMetadata {
    pub job_id: String,
    pub name: String,
    pub file_path: String,
    pub timestamp: DateTime<Utc>,
    pub request_id: String,
    pub instance_id: String,
    pub instance_type: String,
    #[serde(default)]
    pub shared_dir: String,
    #[serde(default)]
    pub extra: String,
}

impl JobMetadata {
    pub fn column_names() -> impl Iterator<Item = &'static str> {
        COLUMNS.iter().map(|column| column.name)
    }

    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            job_id: row.get("job_id")?,
            name: row.get("name")?,
            file_path: row.get("file_path")?,
            timestamp: row.get("timestamp")?,
            request_id: row.get("request_id")?,
            instance_id: row.get("instance_id")?,
            instance_type: row.get("instance_type")?,
            shared_dir: row.get::<_, Option<String>>("shared_dir")?.unwrap_or_default(),
            extra: row.get::<_, Option<String>>("extra")?.unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_order_matches_struct_fields() {
        let names: Vec<_> = JobMetadata::column_names().collect();
        assert_eq!(
            names,
            vec![
                "job_id",
                "name",
                "file_path",
                "timestamp",
                "request_id",
                "instance_id",
                "instance_type",
                "shared_dir",
                "extra"
            ]
        );
    }

    #[test]
    fn optional_fields_default_when_missing_from_json() {
        let meta: JobMetadata = serde_json::from_value(serde_json::json!({
            "job_id": "a",
            "name": "n",
            "file_path": "f.ipynb",
            "timestamp": "2024-03-01T10:00:00Z",
            "request_id": "sir-1",
            "instance_id": "i-1",
            "instance_type": "t3.small"
        }))
        .expect("deserialize");

        assert_eq!(meta.shared_dir, "");
        assert_eq!(meta.extra, "");
    }
}
