//! Storage module for the shared backlog and ingested results
//!
//! This module handles all database operations for the fleet, including:
//! - SQLite database initialization and schema management
//! - Task backlog persistence with atomic claim transitions
//! - Result summary and per-state artifact persistence

mod schema;
mod sqlite;
mod traits;

pub use sqlite::{SqliteResultSession, SqliteStore};
pub use traits::{ResultSink, ResultStore, StorageError, StorageResult, TaskStore};

use std::path::Path;

/// Opens (or creates) the fleet database at `path`
///
/// # Arguments
///
/// * `path` - Path to the SQLite database file
///
/// # Returns
///
/// * `Ok(SqliteStore)` - Successfully initialized storage
/// * `Err(StorageError)` - Failed to initialize storage
pub fn open_store(path: &Path) -> StorageResult<SqliteStore> {
    SqliteStore::new(path)
}

/// Represents a task row in the backlog
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskRow {
    pub id: i64,
    pub url: String,
    pub owner: String,
    pub done: bool,
    pub claimed_at: Option<String>,
    pub finished_at: Option<String>,
}

/// Outcome of an atomic claim
#[derive(Debug, Clone, Default)]
pub struct ClaimedRows {
    /// Rows newly marked as owned by this claim
    pub newly_claimed: usize,

    /// Every unfinished row the claimant owns, including earlier claims
    pub rows: Vec<TaskRow>,
}

/// Task counts per lifecycle state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueCounts {
    pub unclaimed: u64,
    pub claimed: u64,
    pub finished: u64,
}

impl QueueCounts {
    pub fn total(&self) -> u64 {
        self.unclaimed + self.claimed + self.finished
    }
}

/// Represents an ingested crawl summary
#[derive(Debug, Clone)]
pub struct ResultRow {
    pub id: i64,
    pub task_id: i64,
    pub summary: String,
    pub duration_ms: i64,
    pub ingested_at: String,
}

/// Kind of a per-state artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ArtifactKind {
    Dom,
    StrippedDom,
    Screenshot,
}

impl ArtifactKind {
    pub const ALL: [ArtifactKind; 3] = [Self::Dom, Self::StrippedDom, Self::Screenshot];

    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Dom => "dom",
            Self::StrippedDom => "stripped_dom",
            Self::Screenshot => "screenshot",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "dom" => Some(Self::Dom),
            "stripped_dom" => Some(Self::StrippedDom),
            "screenshot" => Some(Self::Screenshot),
            _ => None,
        }
    }

    /// Returns true if artifacts of this kind carry binary payloads
    pub fn is_binary(&self) -> bool {
        matches!(self, Self::Screenshot)
    }
}

impl std::fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.to_db_string())
    }
}

/// Payload of a per-state artifact
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactPayload {
    Text(String),
    Binary(Vec<u8>),
}

impl ArtifactPayload {
    pub fn len(&self) -> usize {
        match self {
            Self::Text(text) => text.len(),
            Self::Binary(bytes) => bytes.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Represents a stored per-state artifact
#[derive(Debug, Clone)]
pub struct ArtifactRow {
    pub result_id: i64,
    pub state_id: String,
    pub kind: ArtifactKind,
    pub payload: ArtifactPayload,
}
