//! Result ingestion module
//!
//! Turns the output directory of a finished crawl into durable records: one
//! summary row plus one artifact row per state for each artifact kind.
//!
//! # Output directory layout
//!
//! ```text
//! <output>/
//!   ...result.json...   summary (any file whose name contains the marker)
//!   doms/               <state>.html, one per state
//!   strippedDOM/        <state>.html, one per state
//!   screenshots/        <state>.png, one per state
//! ```
//!
//! A missing summary fails the whole ingestion. A missing artifact
//! subdirectory is reported for that kind only and the other kinds still run.

mod artifacts;
mod pipeline;

pub use artifacts::{find_summary_file, list_state_files, state_id};
pub use pipeline::{ingest_into, ArtifactFailure, IngestReport, KindReport, ResultIngestor};

use crate::storage::{ArtifactKind, StorageError};
use std::path::PathBuf;
use thiserror::Error;

/// Marker the summary file name must contain
pub const SUMMARY_MARKER: &str = "result.json";

/// Subdirectory holding per-state DOM files
pub const DOM_DIR: &str = "doms";

/// Subdirectory holding per-state stripped DOM files
pub const STRIPPED_DOM_DIR: &str = "strippedDOM";

/// Subdirectory holding per-state screenshots
pub const SCREENSHOT_DIR: &str = "screenshots";

/// Returns the output subdirectory name for an artifact kind
pub fn subdirectory_for(kind: ArtifactKind) -> &'static str {
    match kind {
        ArtifactKind::Dom => DOM_DIR,
        ArtifactKind::StrippedDom => STRIPPED_DOM_DIR,
        ArtifactKind::Screenshot => SCREENSHOT_DIR,
    }
}

/// Result identifier assigned when a summary is uploaded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResultId(pub i64);

impl ResultId {
    pub fn get(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for ResultId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Errors that abort an ingestion before any result id exists
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("No file containing '{marker}' in output directory {dir}")]
    MissingArtifact { marker: &'static str, dir: PathBuf },

    #[error("Could not read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Result store error: {0}")]
    Store(#[from] StorageError),
}

/// Result type for ingestion operations
pub type IngestResult<T> = Result<T, IngestError>;
