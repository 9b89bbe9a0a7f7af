//! Administrative operations
//!
//! Actions an operator runs against the shared store outside the worker
//! loop: bulk submission of a websites file and cascading deletion of a
//! result together with the task that produced it.

use crate::ingest::ResultId;
use crate::queue::{QueueError, TaskId, WorkQueue};
use crate::storage::{ResultStore, StorageResult, TaskStore};
use std::fmt;
use std::path::Path;

/// Outcome of one step of a cascading delete
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// The step removed this many rows
    Deleted(usize),
    /// The step ran but found nothing to remove
    NothingToDelete,
    /// The step was not attempted because an earlier lookup failed
    Skipped,
    /// The step failed with a storage error
    Failed(String),
}

impl StepOutcome {
    fn from_count(result: StorageResult<usize>) -> Self {
        match result {
            Ok(0) => Self::NothingToDelete,
            Ok(n) => Self::Deleted(n),
            Err(e) => Self::Failed(e.to_string()),
        }
    }

    pub fn is_deleted(&self) -> bool {
        matches!(self, Self::Deleted(_))
    }
}

impl fmt::Display for StepOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Deleted(n) => write!(f, "deleted {} row(s)", n),
            Self::NothingToDelete => f.write_str("nothing to delete"),
            Self::Skipped => f.write_str("skipped"),
            Self::Failed(reason) => write!(f, "failed: {}", reason),
        }
    }
}

/// Per-step report of a cascading result deletion
///
/// The three steps run against separate statements with no shared
/// transaction, so any combination of outcomes is possible.
#[derive(Debug, Clone)]
pub struct DeleteReport {
    pub result_id: ResultId,
    pub task_id: Option<TaskId>,
    pub artifacts: StepOutcome,
    pub result: StepOutcome,
    pub task: StepOutcome,
}

impl DeleteReport {
    /// Returns true if the record and its originating task are both gone
    ///
    /// A result without artifacts is fully deleted once the record and the
    /// task are removed.
    pub fn is_complete(&self) -> bool {
        !matches!(self.artifacts, StepOutcome::Failed(_) | StepOutcome::Skipped)
            && self.result.is_deleted()
            && self.task.is_deleted()
    }
}

/// Deletes a result's artifacts, the result record, and its originating task
///
/// Each step runs even when an earlier one failed, except that the task step
/// needs the result record to learn which task to remove.
pub fn delete_result_cascade<S>(store: &S, result_id: ResultId) -> DeleteReport
where
    S: TaskStore + ResultStore,
{
    let lookup = store.get_result(result_id.get());
    let task_id = match &lookup {
        Ok(Some(row)) => Some(TaskId(row.task_id)),
        _ => None,
    };
    tracing::info!(
        "Deleting the results of result {}, task {:?}...",
        result_id,
        task_id
    );

    let artifacts = StepOutcome::from_count(store.delete_artifacts(result_id.get()));
    let result = StepOutcome::from_count(store.delete_result(result_id.get()));
    let task = match lookup {
        Ok(Some(row)) => StepOutcome::from_count(store.delete_task(row.task_id)),
        Ok(None) => StepOutcome::NothingToDelete,
        Err(e) => {
            tracing::error!("Could not look up result {}: {}", result_id, e);
            StepOutcome::Skipped
        }
    };

    let report = DeleteReport {
        result_id,
        task_id,
        artifacts,
        result,
        task,
    };

    if report.is_complete() {
        tracing::info!("Successfully deleted the results of result {}", result_id);
    } else {
        tracing::warn!(
            "Not all data for result {} could be deleted (artifacts: {}, result: {}, task: {})",
            result_id,
            report.artifacts,
            report.result,
            report.task
        );
    }

    report
}

/// Counts from submitting a websites file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubmitSummary {
    pub submitted: Vec<TaskId>,
    /// Lines that were not valid task URLs
    pub rejected: Vec<String>,
    /// Lines whose insert failed in the store
    pub failed: Vec<String>,
}

/// Submits every URL listed in a websites file as an unclaimed task
///
/// The file holds one URL per line; blank lines and lines starting with `#`
/// are ignored.
pub fn submit_websites_file<S: TaskStore>(
    queue: &WorkQueue<S>,
    path: &Path,
) -> std::io::Result<SubmitSummary> {
    let content = std::fs::read_to_string(path)?;
    Ok(submit_websites(queue, &content))
}

/// Submits every URL listed in `content`, one per line
pub fn submit_websites<S: TaskStore>(queue: &WorkQueue<S>, content: &str) -> SubmitSummary {
    let mut summary = SubmitSummary::default();

    for line in content.lines().map(str::trim) {
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        match queue.submit(line, false) {
            Ok(id) => summary.submitted.push(id),
            Err(QueueError::Store(_)) => summary.failed.push(line.to_string()),
            Err(e) => {
                tracing::warn!("Skipping website {:?}: {}", line, e);
                summary.rejected.push(line.to_string());
            }
        }
    }

    tracing::info!(
        "Websites flushed: {} submitted, {} rejected, {} failed",
        summary.submitted.len(),
        summary.rejected.len(),
        summary.failed.len()
    );
    summary
}
