//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the storage traits.
//! The store only remembers where the database lives; every call opens its own
//! connection and drops it before returning.

use crate::storage::schema::initialize_schema;
use crate::storage::traits::{ResultSink, ResultStore, StorageError, StorageResult, TaskStore};
use crate::storage::{
    ArtifactKind, ArtifactPayload, ArtifactRow, ClaimedRows, QueueCounts, ResultRow, TaskRow,
};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default time a connection waits on a locked database before failing
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_millis(5000);

const TASK_COLUMNS: &str = "id, url, worker, crawled, claimed_at, finished_at";

/// SQLite storage backend
#[derive(Debug, Clone)]
pub struct SqliteStore {
    path: PathBuf,
    busy_timeout: Duration,
}

impl SqliteStore {
    /// Creates a new SqliteStore, creating the database and schema if needed
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStore)` - Successfully opened/created database
    /// * `Err(StorageError)` - Failed to open database
    pub fn new(path: &Path) -> StorageResult<Self> {
        Self::with_busy_timeout(path, DEFAULT_BUSY_TIMEOUT)
    }

    /// Creates a new SqliteStore with a custom busy timeout
    pub fn with_busy_timeout(path: &Path, busy_timeout: Duration) -> StorageResult<Self> {
        let store = Self {
            path: path.to_path_buf(),
            busy_timeout,
        };

        let conn = store.connect()?;

        // WAL is persistent on the database file, so set it once up front
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(store)
    }

    /// Path of the underlying database file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn connect(&self) -> StorageResult<Connection> {
        let conn = Connection::open(&self.path)?;
        conn.busy_timeout(self.busy_timeout)?;
        Ok(conn)
    }
}

fn row_to_task(row: &Row<'_>) -> rusqlite::Result<TaskRow> {
    Ok(TaskRow {
        id: row.get(0)?,
        url: row.get(1)?,
        owner: row.get(2)?,
        done: row.get::<_, i64>(3)? != 0,
        claimed_at: row.get(4)?,
        finished_at: row.get(5)?,
    })
}

fn row_to_result(row: &Row<'_>) -> rusqlite::Result<ResultRow> {
    Ok(ResultRow {
        id: row.get(0)?,
        task_id: row.get(1)?,
        summary: row.get(2)?,
        duration_ms: row.get(3)?,
        ingested_at: row.get(4)?,
    })
}

impl TaskStore for SqliteStore {
    // ===== Mutations =====

    fn insert_task(&self, url: &str, owner: &str) -> StorageResult<i64> {
        let conn = self.connect()?;
        let claimed_at = (!owner.is_empty()).then(|| Utc::now().to_rfc3339());
        conn.execute(
            "INSERT INTO workload (url, worker, crawled, claimed_at) VALUES (?1, ?2, 0, ?3)",
            params![url, owner, claimed_at],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn claim_tasks(&self, owner: &str, limit: u32) -> StorageResult<ClaimedRows> {
        if owner.is_empty() {
            return Err(StorageError::Database(
                "cannot claim tasks for an empty owner".to_string(),
            ));
        }

        let mut conn = self.connect()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let now = Utc::now().to_rfc3339();
        let newly_claimed = tx.execute(
            "UPDATE workload SET worker = ?1, claimed_at = ?2
             WHERE id IN (
                 SELECT id FROM workload WHERE worker = '' AND crawled = 0 ORDER BY id LIMIT ?3
             )
             AND worker = '' AND crawled = 0",
            params![owner, now, limit],
        )?;

        let rows = {
            let mut stmt = tx.prepare(&format!(
                "SELECT {} FROM workload WHERE worker = ?1 AND crawled = 0 ORDER BY id",
                TASK_COLUMNS
            ))?;
            let rows = stmt
                .query_map(params![owner], row_to_task)?
                .collect::<Result<Vec<_>, _>>()?;
            rows
        };

        tx.commit()?;

        Ok(ClaimedRows {
            newly_claimed,
            rows,
        })
    }

    fn mark_done(&self, task_id: i64) -> StorageResult<usize> {
        let conn = self.connect()?;
        let now = Utc::now().to_rfc3339();
        let changed = conn.execute(
            "UPDATE workload SET crawled = 1, finished_at = ?2
             WHERE id = ?1 AND worker <> '' AND crawled = 0",
            params![task_id, now],
        )?;
        Ok(changed)
    }

    fn reset_task(&self, task_id: i64) -> StorageResult<usize> {
        let conn = self.connect()?;
        let changed = conn.execute(
            "UPDATE workload SET crawled = 0, worker = '', claimed_at = NULL, finished_at = NULL
             WHERE id = ?1",
            params![task_id],
        )?;
        Ok(changed)
    }

    fn delete_task(&self, task_id: i64) -> StorageResult<usize> {
        let conn = self.connect()?;
        let changed = conn.execute("DELETE FROM workload WHERE id = ?1", params![task_id])?;
        Ok(changed)
    }

    // ===== Queries =====

    fn get_task(&self, task_id: i64) -> StorageResult<Option<TaskRow>> {
        let conn = self.connect()?;
        let task = conn
            .query_row(
                &format!("SELECT {} FROM workload WHERE id = ?1", TASK_COLUMNS),
                params![task_id],
                row_to_task,
            )
            .optional()?;
        Ok(task)
    }

    fn count_tasks(&self) -> StorageResult<QueueCounts> {
        let conn = self.connect()?;
        let (unclaimed, claimed, finished): (i64, i64, i64) = conn.query_row(
            "SELECT
                 COALESCE(SUM(CASE WHEN worker = '' AND crawled = 0 THEN 1 ELSE 0 END), 0),
                 COALESCE(SUM(CASE WHEN worker <> '' AND crawled = 0 THEN 1 ELSE 0 END), 0),
                 COALESCE(SUM(CASE WHEN crawled <> 0 THEN 1 ELSE 0 END), 0)
             FROM workload",
            [],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )?;

        Ok(QueueCounts {
            unclaimed: unclaimed as u64,
            claimed: claimed as u64,
            finished: finished as u64,
        })
    }
}

/// Result-store session holding one open connection
///
/// Dropping the session drops its `Connection`, which closes it, whichever
/// way the ingestion that opened it ends.
pub struct SqliteResultSession {
    conn: Connection,
}

impl ResultSink for SqliteResultSession {
    fn insert_summary(
        &mut self,
        task_id: i64,
        summary: &str,
        duration_ms: i64,
    ) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO website_results (work_task_id, summary, duration_ms, ingested_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![task_id, summary, duration_ms, now],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn insert_artifact(
        &mut self,
        result_id: i64,
        state_id: &str,
        kind: ArtifactKind,
        payload: &ArtifactPayload,
    ) -> StorageResult<()> {
        let (text, blob): (Option<&str>, Option<&[u8]>) = match payload {
            ArtifactPayload::Text(text) => (Some(text.as_str()), None),
            ArtifactPayload::Binary(bytes) => (None, Some(bytes.as_slice())),
        };

        self.conn.execute(
            "INSERT INTO state_artifacts (result_id, state_id, kind, text_content, blob_content)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![result_id, state_id, kind.to_db_string(), text, blob],
        )?;
        Ok(())
    }
}

impl ResultStore for SqliteStore {
    type Session = SqliteResultSession;

    fn open_session(&self) -> StorageResult<SqliteResultSession> {
        Ok(SqliteResultSession {
            conn: self.connect()?,
        })
    }

    fn get_result(&self, result_id: i64) -> StorageResult<Option<ResultRow>> {
        let conn = self.connect()?;
        let result = conn
            .query_row(
                "SELECT id, work_task_id, summary, duration_ms, ingested_at
                 FROM website_results WHERE id = ?1",
                params![result_id],
                row_to_result,
            )
            .optional()?;
        Ok(result)
    }

    fn results_for_task(&self, task_id: i64) -> StorageResult<Vec<ResultRow>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT id, work_task_id, summary, duration_ms, ingested_at
             FROM website_results WHERE work_task_id = ?1 ORDER BY id",
        )?;

        let results = stmt
            .query_map(params![task_id], row_to_result)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(results)
    }

    fn list_artifacts(&self, result_id: i64) -> StorageResult<Vec<ArtifactRow>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT state_id, kind, text_content, blob_content
             FROM state_artifacts WHERE result_id = ?1 ORDER BY kind, state_id",
        )?;

        let raw = stmt
            .query_map(params![result_id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Option<String>>(2)?,
                    row.get::<_, Option<Vec<u8>>>(3)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        raw.into_iter()
            .map(|(state_id, kind_str, text, blob)| {
                let kind = ArtifactKind::from_db_string(&kind_str).ok_or_else(|| {
                    StorageError::Database(format!("Unknown artifact kind: {}", kind_str))
                })?;
                let payload = match (text, blob) {
                    (_, Some(bytes)) => ArtifactPayload::Binary(bytes),
                    (Some(text), None) => ArtifactPayload::Text(text),
                    (None, None) => ArtifactPayload::Text(String::new()),
                };
                Ok(ArtifactRow {
                    result_id,
                    state_id,
                    kind,
                    payload,
                })
            })
            .collect()
    }

    fn delete_artifacts(&self, result_id: i64) -> StorageResult<usize> {
        let conn = self.connect()?;
        let changed = conn.execute(
            "DELETE FROM state_artifacts WHERE result_id = ?1",
            params![result_id],
        )?;
        Ok(changed)
    }

    fn delete_result(&self, result_id: i64) -> StorageResult<usize> {
        let conn = self.connect()?;
        let changed = conn.execute(
            "DELETE FROM website_results WHERE id = ?1",
            params![result_id],
        )?;
        Ok(changed)
    }
}
