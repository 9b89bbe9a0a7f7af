//! Work queue module
//!
//! The work queue is the only component that changes task ownership and
//! completion. A task moves through three states:
//!
//! - unclaimed: no owner, not done
//! - claimed: owned by a worker, not done
//! - finished: owned and checked out
//!
//! `revert` returns a claimed or finished task to the unclaimed pool.

mod coordinator;
mod task;

pub use coordinator::WorkQueue;
pub use task::{parse_task_url, Task, TaskId, WorkerIdentity};

use crate::storage::StorageError;
use crate::UrlError;
use thiserror::Error;

/// Errors returned by work queue operations
///
/// `InvalidUrl` and `NegativeBatchSize` are caller mistakes and retrying them
/// cannot succeed; `Store` is a transient backend failure.
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Invalid task URL: {0}")]
    InvalidUrl(#[from] UrlError),

    #[error("Batch size must be non-negative, got {0}")]
    NegativeBatchSize(i64),

    #[error("Task store error: {0}")]
    Store(#[from] StorageError),
}

impl QueueError {
    /// Returns true if the error is an invalid precondition rather than a
    /// backend failure
    pub fn is_precondition(&self) -> bool {
        matches!(self, Self::InvalidUrl(_) | Self::NegativeBatchSize(_))
    }
}

/// Result type for work queue operations
pub type QueueResult<T> = Result<T, QueueError>;
