use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use rusqlite::{params, Connection, ErrorCode, OptionalExtension, TransactionBehavior};
use tracing::debug;

use crate::error::AppError;

use super::{
    schema::{self, TABLE},
    types::job_metadata::JobMetadata,
};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Handle on the local job table.
///
/// Open one per unit of work and drop (or [`JobStore::close`]) it when done;
/// nothing is cached between handles, all coordination goes through SQLite.
#[derive(Debug)]
pub struct JobStore {
    conn: Connection,
    path: PathBuf,
}

impl JobStore {
    /// # Open or create the job table
    ///
    /// # Arguments
    /// * `path` - Location of the SQLite file; parent directories are created
    ///
    /// # Returns
    /// * `JobStore` with a schema matching the current `JobMetadata` fields
    pub fn open(path: impl AsRef<Path>) -> Result<Self, AppError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let mut conn = Connection::open(&path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        schema::reconcile(&mut conn)?;

        Ok(Self { conn, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Column names as currently persisted, in table order.
    pub fn columns(&self) -> Result<Vec<String>, AppError> {
        Ok(schema::persisted_columns(&self.conn)?)
    }

    /// All records in storage (insertion) order.
    pub fn list(&self) -> Result<Vec<JobMetadata>, AppError> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {} FROM {TABLE} ORDER BY rowid", select_list()))?;
        let rows = stmt
            .query_map([], JobMetadata::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn get(&self, job_id: &str) -> Result<JobMetadata, AppError> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM {TABLE} WHERE job_id = ?1", select_list()),
                params![job_id],
                JobMetadata::from_row,
            )
            .optional()?
            .ok_or_else(|| AppError::NotFound(format!("job {job_id}")))
    }

    pub fn add(&mut self, meta: &JobMetadata) -> Result<(), AppError> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        // Tables carried over from older releases may lack the primary key.
        let exists = tx
            .query_row(
                &format!("SELECT 1 FROM {TABLE} WHERE job_id = ?1"),
                params![meta.job_id],
                |_| Ok(()),
            )
            .optional()?
            .is_some();
        if exists {
            return Err(AppError::DuplicateKey(meta.job_id.clone()));
        }

        tx.execute(
            &format!(
                "INSERT INTO {TABLE} ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                select_list()
            ),
            params![
                meta.job_id,
                meta.name,
                meta.file_path,
                meta.timestamp,
                meta.request_id,
                meta.instance_id,
                meta.instance_type,
                meta.shared_dir,
                meta.extra,
            ],
        )
        .map_err(|err| map_insert_conflict(err, &meta.job_id))?;

        tx.commit()?;
        debug!(job_id = %meta.job_id, "Stored job metadata");
        Ok(())
    }

    /// Removes a record and returns how many rows went away; `0` means the
    /// job was not tracked.
    pub fn delete(&mut self, job_id: &str) -> Result<usize, AppError> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let removed = tx.execute(
            &format!("DELETE FROM {TABLE} WHERE job_id = ?1"),
            params![job_id],
        )?;
        tx.commit()?;

        debug!(%job_id, removed, "Deleted job metadata");
        Ok(removed)
    }

    pub fn close(self) -> Result<(), AppError> {
        self.conn.close().map_err(|(_, err)| AppError::Storage(err))
    }
}

fn select_list() -> String {
    JobMetadata::column_names().collect::<Vec<_>>().join(", ")
}

fn map_insert_conflict(err: rusqlite::Error, job_id: &str) -> AppError {
    if let rusqlite::Error::SqliteFailure(code, _) = &err {
        if code.code == ErrorCode::ConstraintViolation {
            return AppError::DuplicateKey(job_id.to_string());
        }
    }
    AppError::Storage(err)
}
