//! Storage traits and error types
//!
//! This module defines the trait interfaces for the task backlog and the
//! result store, and their associated error types.

use crate::storage::{
    ArtifactKind, ArtifactPayload, ArtifactRow, ClaimedRows, QueueCounts, ResultRow, TaskRow,
};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Durable backlog of crawl tasks
///
/// Every method acquires its own connection for the duration of the call, so
/// implementations can be shared between threads and processes freely. The
/// only component expected to call the mutating methods is the work queue.
pub trait TaskStore {
    // ===== Mutations =====

    /// Inserts a new, unfinished task owned by `owner` (empty for unclaimed)
    ///
    /// # Returns
    ///
    /// The generated task id
    fn insert_task(&self, url: &str, owner: &str) -> StorageResult<i64>;

    /// Atomically claims up to `limit` unclaimed tasks for `owner`, then
    /// returns every unfinished task `owner` holds
    ///
    /// The conditional update and the re-read run in one write-locking
    /// transaction, so two concurrent callers can never be handed the same row.
    fn claim_tasks(&self, owner: &str, limit: u32) -> StorageResult<ClaimedRows>;

    /// Marks a claimed, unfinished task as done
    ///
    /// # Returns
    ///
    /// The number of rows changed (0 when the task is unclaimed, already done,
    /// or does not exist)
    fn mark_done(&self, task_id: i64) -> StorageResult<usize>;

    /// Returns a task to the unclaimed pool
    fn reset_task(&self, task_id: i64) -> StorageResult<usize>;

    /// Physically removes a task (administrative use only)
    fn delete_task(&self, task_id: i64) -> StorageResult<usize>;

    // ===== Queries =====

    /// Gets a task by id
    fn get_task(&self, task_id: i64) -> StorageResult<Option<TaskRow>>;

    /// Counts tasks per lifecycle state
    fn count_tasks(&self) -> StorageResult<QueueCounts>;
}

/// Write side of the result store, bound to one acquired connection
///
/// A sink is obtained through [`ResultStore::open_session`] and releases its
/// connection when dropped.
pub trait ResultSink {
    /// Uploads a crawl summary and returns the newly assigned result id
    fn insert_summary(&mut self, task_id: i64, summary: &str, duration_ms: i64)
        -> StorageResult<i64>;

    /// Uploads one per-state artifact
    fn insert_artifact(
        &mut self,
        result_id: i64,
        state_id: &str,
        kind: ArtifactKind,
        payload: &ArtifactPayload,
    ) -> StorageResult<()>;
}

/// Durable store for ingested crawl results
pub trait ResultStore {
    /// Session type handed to the ingestion pipeline
    type Session: ResultSink;

    /// Acquires a session for a sequence of uploads
    fn open_session(&self) -> StorageResult<Self::Session>;

    /// Gets a result record by id
    fn get_result(&self, result_id: i64) -> StorageResult<Option<ResultRow>>;

    /// Gets every result record ingested for a task
    fn results_for_task(&self, task_id: i64) -> StorageResult<Vec<ResultRow>>;

    /// Lists all artifacts of a result, ordered by kind and state id
    fn list_artifacts(&self, result_id: i64) -> StorageResult<Vec<ArtifactRow>>;

    /// Deletes every artifact of a result
    fn delete_artifacts(&self, result_id: i64) -> StorageResult<usize>;

    /// Deletes the result record itself
    fn delete_result(&self, result_id: i64) -> StorageResult<usize>;
}
