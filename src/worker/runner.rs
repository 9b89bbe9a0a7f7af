//! Worker loop - polls the work queue, crawls, ingests, checks out
//!
//! One worker handles its batch strictly one task at a time. Parallelism
//! comes from running many worker processes, each with its own identity.
//! No storage connection is held while a crawl runs. Crawling and ingestion
//! both do blocking work and run on tokio's blocking pool.

use crate::config::WorkerConfig;
use crate::ingest::{IngestReport, ResultIngestor};
use crate::queue::{Task, TaskId, WorkQueue};
use crate::storage::{ResultStore, TaskStore};
use crate::worker::crawler::{CrawlError, Crawler};
use rand::Rng;
use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Phase the worker loop is currently in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerPhase {
    Idle,
    Polling,
    Crawling,
    Ingesting,
}

impl fmt::Display for WorkerPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Polling => "polling",
            Self::Crawling => "crawling",
            Self::Ingesting => "ingesting",
        };
        f.write_str(name)
    }
}

/// Tunables of the worker loop
#[derive(Debug, Clone)]
pub struct WorkerSettings {
    pub batch_size: u32,
    pub poll_interval: Duration,
    pub poll_jitter: Duration,
    pub output_root: PathBuf,
    pub revert_failed_crawls: bool,
    pub remove_output_after_ingest: bool,
}

impl From<&WorkerConfig> for WorkerSettings {
    fn from(config: &WorkerConfig) -> Self {
        Self {
            batch_size: config.batch_size,
            poll_interval: config.poll_interval(),
            poll_jitter: config.poll_jitter(),
            output_root: config.output_root(),
            revert_failed_crawls: config.revert_failed_crawls,
            remove_output_after_ingest: config.remove_output_after_ingest,
        }
    }
}

/// What happened to a single task during a cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    /// Ingested completely and checked out
    CheckedOut,
    /// The crawl failed; the task was reverted or left claimed
    CrawlFailed { reverted: bool },
    /// No result record could be created
    IngestFailed,
    /// A result record exists but some artifacts are missing from it
    Partial,
    /// Ingested completely, but the checkout itself did not go through
    CheckoutFailed,
}

/// Summary of one polling cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub claimed: usize,
    pub checked_out: usize,
    pub crawl_failures: usize,
    pub reverted: usize,
    pub ingest_failures: usize,
    pub partial: usize,
    pub checkout_failures: usize,
}

impl CycleReport {
    fn record(&mut self, outcome: TaskOutcome) {
        match outcome {
            TaskOutcome::CheckedOut => self.checked_out += 1,
            TaskOutcome::CrawlFailed { reverted } => {
                self.crawl_failures += 1;
                if reverted {
                    self.reverted += 1;
                }
            }
            TaskOutcome::IngestFailed => self.ingest_failures += 1,
            TaskOutcome::Partial => self.partial += 1,
            TaskOutcome::CheckoutFailed => self.checkout_failures += 1,
        }
    }

    /// Returns true if the cycle finished at least one task
    pub fn made_progress(&self) -> bool {
        self.checked_out > 0
    }
}

/// Long-running crawl worker
pub struct WorkerLoop<T, R, C> {
    queue: WorkQueue<T>,
    ingestor: Arc<ResultIngestor<R>>,
    crawler: Arc<C>,
    settings: WorkerSettings,
    phase: WorkerPhase,
}

impl<T, R, C> WorkerLoop<T, R, C>
where
    T: TaskStore,
    R: ResultStore + Send + Sync + 'static,
    C: Crawler + 'static,
{
    /// Creates a new worker loop
    ///
    /// # Arguments
    ///
    /// * `queue` - Work queue bound to this worker's identity
    /// * `ingestor` - Pipeline that stores crawl output
    /// * `crawler` - External crawler invoked for each task
    /// * `settings` - Loop tunables
    pub fn new(
        queue: WorkQueue<T>,
        ingestor: ResultIngestor<R>,
        crawler: C,
        settings: WorkerSettings,
    ) -> Self {
        Self {
            queue,
            ingestor: Arc::new(ingestor),
            crawler: Arc::new(crawler),
            settings,
            phase: WorkerPhase::Idle,
        }
    }

    pub fn phase(&self) -> WorkerPhase {
        self.phase
    }

    pub fn queue(&self) -> &WorkQueue<T> {
        &self.queue
    }

    pub fn ingestor(&self) -> &ResultIngestor<R> {
        &self.ingestor
    }

    fn enter(&mut self, phase: WorkerPhase) {
        if self.phase != phase {
            tracing::debug!("Worker {}: {} -> {}", self.queue.identity(), self.phase, phase);
            self.phase = phase;
        }
    }

    /// Runs forever
    ///
    /// Only process termination stops the loop.
    pub async fn run(&mut self) {
        self.run_until(std::future::pending::<()>()).await
    }

    /// Runs until `shutdown` resolves
    ///
    /// Shutdown is only observed between cycles; a crawl or ingestion in
    /// progress always runs to completion first.
    pub async fn run_until<F>(&mut self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        tracing::info!("Started crawl worker {}", self.queue.identity());

        loop {
            let report = self.poll_once().await;

            let pause = if report.made_progress() {
                Duration::ZERO
            } else {
                self.backoff()
            };
            if !pause.is_zero() {
                tracing::info!("Sleeping for {} milliseconds", pause.as_millis());
            }

            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    tracing::info!("Shutdown requested; worker {} stopped", self.queue.identity());
                    break;
                }
                _ = tokio::time::sleep(pause) => {}
            }
        }

        self.enter(WorkerPhase::Idle);
    }

    /// Fixed poll interval plus optional uniform jitter
    fn backoff(&self) -> Duration {
        let jitter_ms = u64::try_from(self.settings.poll_jitter.as_millis()).unwrap_or(u64::MAX);
        let extra = if jitter_ms == 0 {
            0
        } else {
            rand::thread_rng().gen_range(0..=jitter_ms)
        };
        self.settings.poll_interval + Duration::from_millis(extra)
    }

    /// Runs one polling cycle: claim a batch and process each task in turn
    pub async fn poll_once(&mut self) -> CycleReport {
        self.enter(WorkerPhase::Polling);
        let mut report = CycleReport::default();

        let tasks = match self.queue.claim(i64::from(self.settings.batch_size)) {
            Ok(tasks) => tasks,
            Err(e) => {
                tracing::error!("Claim rejected: {}", e);
                return report;
            }
        };
        report.claimed = tasks.len();

        for task in tasks {
            let outcome = self.process_task(&task).await;
            report.record(outcome);
        }

        self.enter(WorkerPhase::Polling);
        if report.claimed > 0 {
            tracing::info!(
                "Cycle finished: {} claimed, {} checked out, {} crawl failures, {} ingest failures, {} partial",
                report.claimed,
                report.checked_out,
                report.crawl_failures,
                report.ingest_failures,
                report.partial
            );
        }
        report
    }

    async fn process_task(&mut self, task: &Task) -> TaskOutcome {
        self.enter(WorkerPhase::Crawling);
        let output_dir = self.output_dir_for(task.id);

        let started = Instant::now();
        if let Err(e) = self.crawl(task, &output_dir).await {
            tracing::error!("Crawl of {} (task {}) failed: {}", task.url, task.id, e);
            let reverted = self.settings.revert_failed_crawls && self.queue.revert(task.id);
            return TaskOutcome::CrawlFailed { reverted };
        }
        let duration = started.elapsed();
        tracing::info!("Crawl of {} finished in {:?}", task.url, duration);

        self.enter(WorkerPhase::Ingesting);
        let report = match self.ingest(task.id, &output_dir, duration).await {
            Ok(report) => report,
            Err(reason) => {
                tracing::error!("Ingestion of task {} failed: {}", task.id, reason);
                return TaskOutcome::IngestFailed;
            }
        };

        self.finish(task, &output_dir, &report)
    }

    fn finish(&self, task: &Task, output_dir: &Path, report: &IngestReport) -> TaskOutcome {
        if !report.is_complete() {
            tracing::warn!(
                "Task {} left claimed: result {} is missing {} artifacts",
                task.id,
                report.result_id,
                report.failure_count()
            );
            return TaskOutcome::Partial;
        }

        if !self.queue.checkout(task.id) {
            return TaskOutcome::CheckoutFailed;
        }
        tracing::info!("Crawl of {} completed", task.url);

        if self.settings.remove_output_after_ingest {
            match std::fs::remove_dir_all(output_dir) {
                Ok(()) => tracing::debug!("Output directory {} removed", output_dir.display()),
                Err(e) => tracing::warn!(
                    "Could not remove output directory {}: {}",
                    output_dir.display(),
                    e
                ),
            }
        }

        TaskOutcome::CheckedOut
    }

    /// Runs the ingestion pipeline off the async thread
    async fn ingest(
        &self,
        task_id: TaskId,
        output_dir: &Path,
        duration: Duration,
    ) -> Result<IngestReport, String> {
        let ingestor = Arc::clone(&self.ingestor);
        let dir = output_dir.to_path_buf();

        match tokio::task::spawn_blocking(move || ingestor.ingest(task_id, &dir, duration)).await {
            Ok(Ok(report)) => Ok(report),
            Ok(Err(e)) => Err(e.to_string()),
            Err(e) => Err(format!("ingestion aborted: {}", e)),
        }
    }

    fn output_dir_for(&self, id: TaskId) -> PathBuf {
        self.settings.output_root.join(format!("task-{}", id))
    }

    /// Prepares a fresh output directory and runs the crawler off the async
    /// thread
    async fn crawl(&self, task: &Task, output_dir: &Path) -> Result<(), CrawlError> {
        if output_dir.exists() {
            std::fs::remove_dir_all(output_dir)?;
        }
        std::fs::create_dir_all(output_dir)?;

        let crawler = Arc::clone(&self.crawler);
        let url = task.url.clone();
        let dir = output_dir.to_path_buf();

        tokio::task::spawn_blocking(move || crawler.crawl(&url, &dir))
            .await
            .map_err(|e| CrawlError::Aborted(e.to_string()))?
    }
}
