//! Task and worker identity types

use crate::storage::TaskRow;
use crate::UrlError;
use std::fmt;
use url::Url;

/// Store-assigned identifier of a crawl task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(pub i64);

impl TaskId {
    pub fn get(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for TaskId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// One URL to crawl, as handed out by the work queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    pub id: TaskId,
    pub url: Url,
    /// Identity of the worker holding the task, empty when unclaimed
    pub owner: String,
    pub done: bool,
}

impl Task {
    /// Materializes a task from a backlog row
    ///
    /// Fails when the stored URL no longer parses as a crawlable URL.
    pub fn from_row(row: TaskRow) -> Result<Self, UrlError> {
        let url = parse_task_url(&row.url)?;
        Ok(Self {
            id: TaskId(row.id),
            url,
            owner: row.owner,
            done: row.done,
        })
    }

    /// Returns true if some worker holds this task
    pub fn is_claimed(&self) -> bool {
        !self.owner.is_empty()
    }
}

/// Parses and validates a task URL
///
/// Only absolute `http` and `https` URLs with a host are accepted.
pub fn parse_task_url(url_str: &str) -> Result<Url, UrlError> {
    let url = Url::parse(url_str.trim()).map_err(|e| UrlError::Parse(e.to_string()))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(format!(
            "Only HTTP and HTTPS schemes are supported, got: {}",
            url.scheme()
        )));
    }

    if url.host_str().map_or(true, str::is_empty) {
        return Err(UrlError::MissingDomain);
    }

    Ok(url)
}

/// Identity a worker process uses as the owner of the tasks it claims
///
/// Derived once per process and passed explicitly to the work queue and the
/// worker loop.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WorkerIdentity(String);

impl WorkerIdentity {
    /// Creates an identity from an explicit value
    ///
    /// Returns `None` for an empty or whitespace-only value, since the empty
    /// owner marks a task as unclaimed.
    pub fn new(id: impl Into<String>) -> Option<Self> {
        let id = id.into();
        let trimmed = id.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    /// Derives an identity from the host name
    ///
    /// Checks the `HOSTNAME` environment variable, then `/etc/hostname`,
    /// and falls back to `localhost`.
    pub fn from_host() -> Self {
        let from_env = std::env::var("HOSTNAME").ok().and_then(Self::new);
        if let Some(identity) = from_env {
            return identity;
        }

        std::fs::read_to_string("/etc/hostname")
            .ok()
            .and_then(Self::new)
            .unwrap_or_else(|| Self("localhost".to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WorkerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
