//! Execution history store (C6), spec.md section 6: `batches` and
//! `operations` tables recording every executed plan so it can later be
//! undone.
//!
//! Grounded on `cache/store.rs`'s shape (a mutex-guarded `rusqlite`
//! connection with an idempotent schema), but kept as its own store since
//! cache entries are disposable while history rows are the only record of
//! what `execute` actually did.

use std::path::Path;

use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::{RenamerError, Result};
use crate::model::{Batch, BatchOperation, BatchStatus, OperationOutcome, Pipeline};

/// The execution history store.
pub struct History {
    conn: Mutex<Connection>,
}

impl History {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|source| RenamerError::IoError {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let conn = Connection::open(path).map_err(RenamerError::HistoryStoreError)?;
        Self::init_schema(&conn)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(RenamerError::HistoryStoreError)?;
        Self::init_schema(&conn)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    fn init_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS batches (
                id INTEGER PRIMARY KEY,
                timestamp INTEGER NOT NULL,
                pipeline_json TEXT NOT NULL,
                status TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS operations (
                batch_id INTEGER NOT NULL,
                ordinal INTEGER NOT NULL,
                original_path TEXT NOT NULL,
                final_path TEXT NOT NULL,
                case_only INTEGER NOT NULL,
                companion_of INTEGER,
                outcome TEXT NOT NULL,
                reason TEXT,
                PRIMARY KEY (batch_id, ordinal)
            );",
        )
        .map_err(RenamerError::HistoryStoreError)?;
        Ok(())
    }

    /// Records a completed (or partially failed) batch. Called unconditionally
    /// after `exec::execute` runs, even when some operations failed, since the
    /// history store is the only way to later undo the operations that did
    /// succeed.
    pub fn record_batch(&self, batch: &Batch) -> Result<()> {
        let pipeline_json =
            serde_json::to_string(&batch.pipeline_snapshot).expect("Pipeline is serializable");
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO batches (id, timestamp, pipeline_json, status) VALUES (?1, ?2, ?3, ?4)",
            params![batch.id as i64, batch.timestamp, pipeline_json, batch.status.as_str()],
        )
        .map_err(RenamerError::HistoryStoreError)?;

        for (ordinal, op) in batch.operations.iter().enumerate() {
            conn.execute(
                "INSERT INTO operations \
                 (batch_id, ordinal, original_path, final_path, case_only, companion_of, outcome, reason) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    batch.id as i64,
                    ordinal as i64,
                    op.original_path.to_string_lossy(),
                    op.final_path.to_string_lossy(),
                    op.case_only as i64,
                    op.companion_of.map(|v| v as i64),
                    op.outcome.as_str(),
                    op.outcome.reason(),
                ],
            )
            .map_err(RenamerError::HistoryStoreError)?;
        }
        Ok(())
    }

    pub fn get_batch(&self, id: u64) -> Result<Option<Batch>> {
        let conn = self.conn.lock();
        let header: Option<(i64, String, String)> = conn
            .query_row(
                "SELECT timestamp, pipeline_json, status FROM batches WHERE id = ?1",
                params![id as i64],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()
            .map_err(RenamerError::HistoryStoreError)?;
        let Some((timestamp, pipeline_json, status)) = header else {
            return Ok(None);
        };
        let pipeline_snapshot: Pipeline = serde_json::from_str(&pipeline_json).map_err(|e| {
            RenamerError::HistoryStoreError(rusqlite::Error::InvalidColumnType(
                1,
                format!("pipeline_json: {e}"),
                rusqlite::types::Type::Text,
            ))
        })?;
        let status = BatchStatus::parse(&status).unwrap_or(BatchStatus::Completed);

        let mut stmt = conn
            .prepare(
                "SELECT original_path, final_path, case_only, companion_of, outcome, reason \
                 FROM operations WHERE batch_id = ?1 ORDER BY ordinal",
            )
            .map_err(RenamerError::HistoryStoreError)?;
        let rows = stmt
            .query_map(params![id as i64], |row| {
                let original_path: String = row.get(0)?;
                let final_path: String = row.get(1)?;
                let case_only: i64 = row.get(2)?;
                let companion_of: Option<i64> = row.get(3)?;
                let outcome: String = row.get(4)?;
                let reason: Option<String> = row.get(5)?;
                Ok((original_path, final_path, case_only, companion_of, outcome, reason))
            })
            .map_err(RenamerError::HistoryStoreError)?;

        let mut operations = Vec::new();
        for row in rows {
            let (original_path, final_path, case_only, companion_of, outcome, reason) =
                row.map_err(RenamerError::HistoryStoreError)?;
            let outcome = match outcome.as_str() {
                "success" => OperationOutcome::Success,
                "skipped" => OperationOutcome::Skipped(reason.unwrap_or_default()),
                _ => OperationOutcome::Failed(reason.unwrap_or_default()),
            };
            operations.push(BatchOperation {
                original_path: original_path.into(),
                final_path: final_path.into(),
                case_only: case_only != 0,
                companion_of: companion_of.map(|v| v as u64),
                outcome,
            });
        }

        Ok(Some(Batch {
            id,
            timestamp,
            operations,
            pipeline_snapshot,
            status,
        }))
    }

    /// Marks a batch `undone` after its reversal completes, so a second
    /// `undo` call on the same id is rejected by the pre-check rather than
    /// silently re-running.
    pub fn mark_undone(&self, id: u64) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "UPDATE batches SET status = ?2 WHERE id = ?1",
            params![id as i64, BatchStatus::Undone.as_str()],
        )
        .map_err(RenamerError::HistoryStoreError)?;
        Ok(())
    }

    /// The next unused batch id, for callers that don't already have one.
    pub fn next_batch_id(&self) -> Result<u64> {
        let conn = self.conn.lock();
        let max: Option<i64> = conn
            .query_row("SELECT MAX(id) FROM batches", [], |row| row.get(0))
            .map_err(RenamerError::HistoryStoreError)?;
        Ok(max.unwrap_or(0) as u64 + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CasePolicy, ModuleConfig};
    use std::path::PathBuf;

    fn sample_pipeline() -> Pipeline {
        Pipeline::new(vec![ModuleConfig::NameTransform {
            case_policy: CasePolicy::AsIs,
            separator_policy: crate::model::SeparatorPolicy::Keep,
            trim: false,
        }])
        .unwrap()
    }

    fn sample_batch(id: u64) -> Batch {
        Batch {
            id,
            timestamp: 1_700_000_000,
            operations: vec![
                BatchOperation {
                    original_path: PathBuf::from("/a/old.jpg"),
                    final_path: PathBuf::from("/a/new.jpg"),
                    case_only: false,
                    companion_of: None,
                    outcome: OperationOutcome::Success,
                },
                BatchOperation {
                    original_path: PathBuf::from("/a/old.srt"),
                    final_path: PathBuf::from("/a/new.srt"),
                    case_only: false,
                    companion_of: Some(0),
                    outcome: OperationOutcome::Failed("permission denied".to_string()),
                },
            ],
            pipeline_snapshot: sample_pipeline(),
            status: BatchStatus::PartiallyFailed,
        }
    }

    #[test]
    fn records_and_reloads_a_batch() {
        let history = History::open_in_memory().unwrap();
        history.record_batch(&sample_batch(1)).unwrap();

        let loaded = history.get_batch(1).unwrap().unwrap();
        assert_eq!(loaded.operations.len(), 2);
        assert_eq!(loaded.status, BatchStatus::PartiallyFailed);
        assert_eq!(loaded.operations[0].outcome, OperationOutcome::Success);
        assert_eq!(loaded.operations[1].companion_of, Some(0));
        assert_eq!(
            loaded.operations[1].outcome,
            OperationOutcome::Failed("permission denied".to_string())
        );
    }

    #[test]
    fn unknown_batch_id_returns_none() {
        let history = History::open_in_memory().unwrap();
        assert!(history.get_batch(99).unwrap().is_none());
    }

    #[test]
    fn mark_undone_updates_status() {
        let history = History::open_in_memory().unwrap();
        history.record_batch(&sample_batch(1)).unwrap();
        history.mark_undone(1).unwrap();
        assert_eq!(history.get_batch(1).unwrap().unwrap().status, BatchStatus::Undone);
    }

    #[test]
    fn next_batch_id_increments() {
        let history = History::open_in_memory().unwrap();
        assert_eq!(history.next_batch_id().unwrap(), 1);
        history.record_batch(&sample_batch(1)).unwrap();
        assert_eq!(history.next_batch_id().unwrap(), 2);
    }
}
