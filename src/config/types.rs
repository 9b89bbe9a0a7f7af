use crate::queue::WorkerIdentity;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration structure for a crawl-fleet node
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub store: StoreConfig,
    #[serde(default)]
    pub worker: WorkerConfig,
    pub crawler: CrawlerConfig,
}

/// Shared backlog database configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// Path to the SQLite database file shared by the fleet
    #[serde(rename = "database-path")]
    pub database_path: String,

    /// How long a connection waits on a locked database (milliseconds)
    #[serde(rename = "busy-timeout-ms", default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

/// Worker loop configuration
#[derive(Debug, Clone, Deserialize)]
pub struct WorkerConfig {
    /// Explicit worker identity; derived from the host name when absent
    #[serde(default)]
    pub identity: Option<String>,

    /// Maximum number of tasks claimed per poll
    #[serde(rename = "batch-size", default = "default_batch_size")]
    pub batch_size: u32,

    /// Pause between polls that found no work (milliseconds)
    #[serde(rename = "poll-interval-ms", default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Upper bound of the random delay added to each pause (milliseconds)
    #[serde(rename = "poll-jitter-ms", default)]
    pub poll_jitter_ms: u64,

    /// Directory under which each task gets its own crawl output directory
    #[serde(rename = "output-root", default = "default_output_root")]
    pub output_root: String,

    /// Return tasks whose crawl failed to the unclaimed pool
    #[serde(rename = "revert-failed-crawls", default = "default_true")]
    pub revert_failed_crawls: bool,

    /// Delete a task's output directory once it is checked out
    #[serde(rename = "remove-output-after-ingest", default)]
    pub remove_output_after_ingest: bool,
}

/// External crawler invocation
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Program to run for each crawl
    pub program: String,

    /// Arguments; `{url}` and `{output}` are substituted per task
    #[serde(default = "default_crawler_args")]
    pub args: Vec<String>,
}

fn default_busy_timeout_ms() -> u64 {
    5000
}

fn default_batch_size() -> u32 {
    1
}

fn default_poll_interval_ms() -> u64 {
    10_000
}

fn default_output_root() -> String {
    "output".to_string()
}

fn default_true() -> bool {
    true
}

fn default_crawler_args() -> Vec<String> {
    vec!["{url}".to_string(), "{output}".to_string()]
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            identity: None,
            batch_size: default_batch_size(),
            poll_interval_ms: default_poll_interval_ms(),
            poll_jitter_ms: 0,
            output_root: default_output_root(),
            revert_failed_crawls: true,
            remove_output_after_ingest: false,
        }
    }
}

impl StoreConfig {
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

impl WorkerConfig {
    /// Resolves the worker identity, falling back to the host name
    pub fn resolve_identity(&self) -> WorkerIdentity {
        self.identity
            .as_deref()
            .and_then(WorkerIdentity::new)
            .unwrap_or_else(WorkerIdentity::from_host)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn poll_jitter(&self) -> Duration {
        Duration::from_millis(self.poll_jitter_ms)
    }

    pub fn output_root(&self) -> PathBuf {
        PathBuf::from(&self.output_root)
    }
}
