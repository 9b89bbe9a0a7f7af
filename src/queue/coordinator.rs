//! Work queue coordinator
//!
//! Submit, claim, checkout and revert crawl tasks against the shared backlog.
//! Backend failures are logged here and turned into "nothing happened" values
//! so a polling worker simply retries on its next cycle.

use crate::queue::task::{parse_task_url, Task, TaskId, WorkerIdentity};
use crate::queue::{QueueError, QueueResult};
use crate::storage::{QueueCounts, TaskStore};

/// Coordinates the shared task backlog on behalf of one worker identity
pub struct WorkQueue<S> {
    store: S,
    identity: WorkerIdentity,
}

impl<S: TaskStore> WorkQueue<S> {
    /// Creates a new work queue
    ///
    /// # Arguments
    ///
    /// * `store` - The task backlog
    /// * `identity` - Owner recorded on every task this queue claims
    pub fn new(store: S, identity: WorkerIdentity) -> Self {
        tracing::info!("Work queue using worker identity: {}", identity);
        Self { store, identity }
    }

    pub fn identity(&self) -> &WorkerIdentity {
        &self.identity
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Submits a new URL to the backlog
    ///
    /// When `pre_claim` is set the task is owned by this worker from the
    /// moment it is inserted and other workers never see it.
    ///
    /// # Returns
    ///
    /// * `Ok(TaskId)` - The id of the new task
    /// * `Err(QueueError::InvalidUrl)` - The URL is not a crawlable absolute URL
    /// * `Err(QueueError::Store)` - The insert failed
    pub fn submit(&self, url: &str, pre_claim: bool) -> QueueResult<TaskId> {
        let url = parse_task_url(url)?;
        let owner = if pre_claim { self.identity.as_str() } else { "" };

        match self.store.insert_task(url.as_str(), owner) {
            Ok(id) => {
                tracing::info!("Submitted {} as task {}", url, id);
                Ok(TaskId(id))
            }
            Err(e) => {
                tracing::error!("Failed to submit {}: {}", url, e);
                Err(QueueError::Store(e))
            }
        }
    }

    /// Claims up to `max_count` unclaimed tasks and returns every unfinished
    /// task this worker owns
    ///
    /// Tasks claimed earlier but never checked out are handed back again, so
    /// a restarted worker picks up where it died. The call never waits for
    /// work to appear.
    ///
    /// # Returns
    ///
    /// * `Ok(Vec<Task>)` - Owned unfinished tasks; empty if the store failed
    /// * `Err(QueueError::NegativeBatchSize)` - `max_count` was negative
    pub fn claim(&self, max_count: i64) -> QueueResult<Vec<Task>> {
        if max_count < 0 {
            return Err(QueueError::NegativeBatchSize(max_count));
        }
        let limit = u32::try_from(max_count).unwrap_or(u32::MAX);

        let claimed = match self.store.claim_tasks(self.identity.as_str(), limit) {
            Ok(claimed) => claimed,
            Err(e) => {
                tracing::error!("Failed to claim tasks: {}", e);
                return Ok(Vec::new());
            }
        };
        tracing::debug!("Tasks claimed by {}: {}", self.identity, claimed.newly_claimed);

        let mut tasks = Vec::with_capacity(claimed.rows.len());
        for row in claimed.rows {
            let id = row.id;
            match Task::from_row(row) {
                Ok(task) => {
                    tracing::info!("Task retrieved: {} ({})", task.url, task.id);
                    tasks.push(task);
                }
                Err(e) => tracing::error!("Skipping task {} with malformed URL: {}", id, e),
            }
        }

        Ok(tasks)
    }

    /// Marks a claimed task as finished
    ///
    /// # Returns
    ///
    /// True if exactly one task changed. Unclaimed, already finished and
    /// unknown tasks are left untouched and yield false.
    pub fn checkout(&self, id: TaskId) -> bool {
        match self.store.mark_done(id.get()) {
            Ok(1) => {
                tracing::info!("Checked out task {}", id);
                true
            }
            Ok(changed) => {
                tracing::warn!("Checkout of task {} changed {} rows", id, changed);
                false
            }
            Err(e) => {
                tracing::error!("Failed to check out task {}: {}", id, e);
                false
            }
        }
    }

    /// Returns a claimed or finished task to the unclaimed pool
    ///
    /// # Returns
    ///
    /// True if exactly one task changed
    pub fn revert(&self, id: TaskId) -> bool {
        match self.store.reset_task(id.get()) {
            Ok(1) => {
                tracing::info!("Reverted claim/checkout of task {}", id);
                true
            }
            Ok(changed) => {
                tracing::warn!("Revert of task {} changed {} rows", id, changed);
                false
            }
            Err(e) => {
                tracing::error!("Failed to revert task {}: {}", id, e);
                false
            }
        }
    }

    /// Looks up a single task
    pub fn task(&self, id: TaskId) -> QueueResult<Option<Task>> {
        match self.store.get_task(id.get())? {
            Some(row) => Ok(Some(Task::from_row(row)?)),
            None => Ok(None),
        }
    }

    /// Counts tasks per lifecycle state
    pub fn stats(&self) -> QueueResult<QueueCounts> {
        Ok(self.store.count_tasks()?)
    }
}
