//! Result ingestion pipeline

use crate::ingest::artifacts::{find_summary_file, list_state_files, read_payload, state_id};
use crate::ingest::{subdirectory_for, IngestError, IngestResult, ResultId};
use crate::queue::TaskId;
use crate::storage::{ArtifactKind, ResultSink, ResultStore};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// A single artifact file that could not be ingested
#[derive(Debug, Clone)]
pub struct ArtifactFailure {
    pub path: PathBuf,
    pub reason: String,
}

impl fmt::Display for ArtifactFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path.display(), self.reason)
    }
}

/// Outcome of ingesting one artifact kind
#[derive(Debug, Clone)]
pub struct KindReport {
    pub kind: ArtifactKind,

    /// False when the kind's subdirectory did not exist
    pub directory_found: bool,

    /// State ids uploaded successfully
    pub uploaded: Vec<String>,

    /// Files (or the directory itself) that failed
    pub failures: Vec<ArtifactFailure>,
}

impl KindReport {
    fn new(kind: ArtifactKind) -> Self {
        Self {
            kind,
            directory_found: false,
            uploaded: Vec::new(),
            failures: Vec::new(),
        }
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Outcome of ingesting a crawl output directory
#[derive(Debug, Clone)]
pub struct IngestReport {
    pub task_id: TaskId,
    pub result_id: ResultId,
    pub dom: KindReport,
    pub stripped_dom: KindReport,
    pub screenshots: KindReport,
}

impl IngestReport {
    pub fn kinds(&self) -> [&KindReport; 3] {
        [&self.dom, &self.stripped_dom, &self.screenshots]
    }

    /// Returns true if every artifact that was found was also stored
    ///
    /// Missing subdirectories do not count against completeness; failed
    /// reads and uploads do.
    pub fn is_complete(&self) -> bool {
        self.kinds().iter().all(|kind| kind.is_clean())
    }

    /// Total number of artifacts stored across all kinds
    pub fn uploaded_count(&self) -> usize {
        self.kinds().iter().map(|kind| kind.uploaded.len()).sum()
    }

    /// Total number of failed artifacts across all kinds
    pub fn failure_count(&self) -> usize {
        self.kinds().iter().map(|kind| kind.failures.len()).sum()
    }
}

/// Uploads crawl output directories to a result store
pub struct ResultIngestor<S> {
    store: S,
}

impl<S: ResultStore> ResultIngestor<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Ingests the output directory of a finished crawl
    ///
    /// Opens one result-store session for the whole directory; the session is
    /// released when this call returns, on success and failure alike.
    ///
    /// # Arguments
    ///
    /// * `task_id` - The task whose crawl produced the directory
    /// * `output_dir` - The crawl output directory
    /// * `duration` - How long the crawl took
    ///
    /// # Returns
    ///
    /// * `Ok(IngestReport)` - A result record exists; see the report for
    ///   per-kind outcomes
    /// * `Err(IngestError)` - No result record was created
    pub fn ingest(
        &self,
        task_id: TaskId,
        output_dir: &Path,
        duration: Duration,
    ) -> IngestResult<IngestReport> {
        let mut session = self.store.open_session()?;
        ingest_into(&mut session, task_id, output_dir, duration)
    }
}

/// Runs the ingestion steps against an already acquired sink
///
/// The summary is uploaded first and its result id keys every artifact.
/// The three artifact kinds are then processed independently: a missing
/// directory or a failed file in one kind never stops the others.
pub fn ingest_into<K: ResultSink + ?Sized>(
    sink: &mut K,
    task_id: TaskId,
    output_dir: &Path,
    duration: Duration,
) -> IngestResult<IngestReport> {
    let result_id = upload_summary(sink, task_id, output_dir, duration)?;
    tracing::info!(
        "Uploaded summary of task {} as result {}",
        task_id,
        result_id
    );

    let dom = upload_kind(sink, result_id, output_dir, ArtifactKind::Dom);
    let stripped_dom = upload_kind(sink, result_id, output_dir, ArtifactKind::StrippedDom);
    let screenshots = upload_kind(sink, result_id, output_dir, ArtifactKind::Screenshot);

    let report = IngestReport {
        task_id,
        result_id,
        dom,
        stripped_dom,
        screenshots,
    };

    if report.is_complete() {
        tracing::info!(
            "Ingested result {}: {} artifacts",
            result_id,
            report.uploaded_count()
        );
    } else {
        tracing::warn!(
            "Result {} is partial: {} artifacts stored, {} failed",
            result_id,
            report.uploaded_count(),
            report.failure_count()
        );
    }

    Ok(report)
}

fn upload_summary<K: ResultSink + ?Sized>(
    sink: &mut K,
    task_id: TaskId,
    output_dir: &Path,
    duration: Duration,
) -> IngestResult<ResultId> {
    let path = find_summary_file(output_dir)?;
    let summary = fs::read_to_string(&path).map_err(|source| IngestError::Read {
        path: path.clone(),
        source,
    })?;

    let duration_ms = i64::try_from(duration.as_millis()).unwrap_or(i64::MAX);
    let id = sink.insert_summary(task_id.get(), &summary, duration_ms)?;
    Ok(ResultId(id))
}

fn upload_kind<K: ResultSink + ?Sized>(
    sink: &mut K,
    result_id: ResultId,
    output_dir: &Path,
    kind: ArtifactKind,
) -> KindReport {
    let mut report = KindReport::new(kind);
    let dir = output_dir.join(subdirectory_for(kind));

    if !dir.is_dir() {
        tracing::warn!("No {} directory in {}", kind, output_dir.display());
        return report;
    }
    report.directory_found = true;

    let files = match list_state_files(&dir) {
        Ok(files) => files,
        Err(e) => {
            tracing::error!("Could not list {}: {}", dir.display(), e);
            report.failures.push(ArtifactFailure {
                path: dir,
                reason: e.to_string(),
            });
            return report;
        }
    };
    tracing::info!("{} {} states found", files.len(), kind);

    for path in files {
        match upload_file(sink, result_id, kind, &path) {
            Ok(state) => {
                tracing::debug!("Uploaded {} of state {}", kind, state);
                report.uploaded.push(state);
            }
            Err(reason) => {
                tracing::error!("Could not upload {}: {}", path.display(), reason);
                report.failures.push(ArtifactFailure { path, reason });
            }
        }
    }

    report
}

fn upload_file<K: ResultSink + ?Sized>(
    sink: &mut K,
    result_id: ResultId,
    kind: ArtifactKind,
    path: &Path,
) -> Result<String, String> {
    let state = state_id(path).ok_or_else(|| "file name is not a valid state id".to_string())?;
    let payload = read_payload(kind, path).map_err(|e| e.to_string())?;
    sink.insert_artifact(result_id.get(), &state, kind, &payload)
        .map_err(|e| e.to_string())?;
    Ok(state)
}
