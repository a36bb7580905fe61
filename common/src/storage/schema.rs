use std::collections::{BTreeSet, HashMap};

use rusqlite::{params_from_iter, types::Value, Connection, TransactionBehavior};
use tracing::{info, warn};

use crate::error::AppError;

use super::types::job_metadata::{Column, COLUMNS};

pub(crate) const TABLE: &str = "jobmeta";

#[derive(Debug, PartialEq, Eq)]
enum SchemaState {
    Missing,
    Current,
    /// Persisted columns are a strict subset of the current ones.
    Outdated { added: Vec<Column> },
    /// Persisted columns include names the current schema does not know.
    Incompatible { unknown: Vec<String> },
}

fn classify(persisted: &[String]) -> SchemaState {
    if persisted.is_empty() {
        return SchemaState::Missing;
    }

    let current: BTreeSet<&str> = COLUMNS.iter().map(|c| c.name).collect();
    let stored: BTreeSet<&str> = persisted.iter().map(String::as_str).collect();

    let unknown: Vec<String> = stored
        .difference(&current)
        .map(|name| (*name).to_string())
        .collect();
    if !unknown.is_empty() {
        return SchemaState::Incompatible { unknown };
    }

    let added: Vec<Column> = COLUMNS
        .iter()
        .filter(|c| !stored.contains(c.name))
        .copied()
        .collect();
    if added.is_empty() {
        SchemaState::Current
    } else {
        SchemaState::Outdated { added }
    }
}

pub(crate) fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

pub(crate) fn persisted_columns(conn: &Connection) -> rusqlite::Result<Vec<String>> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({TABLE})"))?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(names)
}

fn create_table(conn: &Connection) -> rusqlite::Result<()> {
    let columns = COLUMNS
        .iter()
        .map(|c| {
            if c.name == "job_id" {
                format!("{} text PRIMARY KEY", c.name)
            } else {
                format!("{} text", c.name)
            }
        })
        .collect::<Vec<_>>()
        .join(", ");
    conn.execute_batch(&format!("CREATE TABLE {TABLE} ({columns})"))
}

/// Brings the `jobmeta` table in line with the current `JobMetadata` fields.
///
/// A current table is only read, so concurrent readers never wait on each
/// other. Any change runs in one immediate transaction after re-reading the
/// schema under the lock; a failed upgrade leaves the previous table in place.
pub(crate) fn reconcile(conn: &mut Connection) -> Result<(), AppError> {
    if classify(&persisted_columns(conn)?) == SchemaState::Current {
        return Ok(());
    }

    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let persisted = persisted_columns(&tx)?;

    match classify(&persisted) {
        SchemaState::Missing => {
            info!(table = TABLE, "Creating job metadata table");
            create_table(&tx)?;
        }
        SchemaState::Current => {}
        SchemaState::Outdated { added } => {
            warn!(
                persisted = ?persisted,
                added = ?added.iter().map(|c| c.name).collect::<Vec<_>>(),
                "Upgrading the job metadata table"
            );
            let carried = migrate(&tx, &persisted, &added)?;
            info!(rows = carried, "Job metadata table upgraded");
        }
        SchemaState::Incompatible { unknown } => {
            warn!(
                table = TABLE,
                "Existing job table is incompatible with the current schema; recreating it empty"
            );
            for name in &unknown {
                warn!(column = %name, "Discarding unknown column");
            }
            tx.execute_batch(&format!("DROP TABLE {TABLE}"))?;
            create_table(&tx)?;
        }
    }

    tx.commit()?;
    Ok(())
}

/// Rebuilds the table with the full schema, backfilling `added` columns
/// with their declared defaults. Returns the number of rows carried over.
fn migrate(conn: &Connection, persisted: &[String], added: &[Column]) -> Result<usize, AppError> {
    if let Some(column) = added.iter().find(|c| c.default.is_none()) {
        return Err(AppError::Migration(format!(
            "column `{}` has no default and cannot be backfilled",
            column.name
        )));
    }

    let select = persisted
        .iter()
        .map(|name| quote_ident(name))
        .collect::<Vec<_>>()
        .join(", ");
    let mut stmt = conn.prepare(&format!("SELECT {select} FROM {TABLE} ORDER BY rowid"))?;
    let rows = stmt
        .query_map([], |row| {
            let mut values = HashMap::with_capacity(persisted.len());
            for (idx, name) in persisted.iter().enumerate() {
                values.insert(name.as_str(), row.get::<_, Value>(idx)?);
            }
            Ok(values)
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    drop(stmt);

    conn.execute_batch(&format!("DROP TABLE {TABLE}"))?;
    create_table(conn)?;

    let carried = rows.len();
    let slots = vec!["?"; COLUMNS.len()].join(", ");
    let mut insert = conn.prepare(&format!("INSERT INTO {TABLE} VALUES ({slots})"))?;
    for mut row in rows {
        let values = COLUMNS.iter().map(|column| {
            row.remove(column.name).unwrap_or_else(|| {
                Value::Text(column.default.unwrap_or_default().to_string())
            })
        });
        insert.execute(params_from_iter(values))?;
    }

    Ok(carried)
}
