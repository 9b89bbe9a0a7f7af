//! Locating and reading crawl output files

use crate::ingest::{IngestError, IngestResult, SUMMARY_MARKER};
use crate::storage::{ArtifactKind, ArtifactPayload};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Finds the summary file in a crawl output directory
///
/// The summary is the regular file whose name contains [`SUMMARY_MARKER`].
/// If several match, the last one in name order wins.
///
/// # Returns
///
/// * `Ok(PathBuf)` - Path of the summary file
/// * `Err(IngestError::MissingArtifact)` - No matching file exists
/// * `Err(IngestError::Read)` - The directory could not be listed
pub fn find_summary_file(dir: &Path) -> IngestResult<PathBuf> {
    let entries = fs::read_dir(dir).map_err(|source| IngestError::Read {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut candidates: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .filter(|path| {
            path.file_name()
                .and_then(|name| name.to_str())
                .map_or(false, |name| name.contains(SUMMARY_MARKER))
        })
        .collect();
    candidates.sort();

    candidates.pop().ok_or_else(|| IngestError::MissingArtifact {
        marker: SUMMARY_MARKER,
        dir: dir.to_path_buf(),
    })
}

/// Lists the regular files of a per-state subdirectory, sorted by name
///
/// Hidden files (names starting with `.`) are not page states and are skipped.
pub fn list_state_files(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_name().to_string_lossy().starts_with('.') {
            continue;
        }
        let path = entry.path();
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Derives the state id of an artifact file: the part of its name before the
/// last `.`
///
/// `state3.html` becomes `state3`, `index.min.html` becomes `index.min`, and
/// a name without a `.` is used as is. Names that leave nothing before the
/// last `.` (such as `.html`) have no state id.
pub fn state_id(path: &Path) -> Option<String> {
    let name = path.file_name()?.to_str()?;
    let stem = match name.rsplit_once('.') {
        Some((stem, _)) => stem,
        None => name,
    };
    (!stem.is_empty()).then(|| stem.to_string())
}

/// Reads an artifact file into the payload shape its kind stores
///
/// Text kinds whose bytes are not valid UTF-8 (pages in legacy encodings)
/// are kept byte for byte as a binary payload.
pub fn read_payload(kind: ArtifactKind, path: &Path) -> io::Result<ArtifactPayload> {
    let bytes = fs::read(path)?;
    if kind.is_binary() {
        return Ok(ArtifactPayload::Binary(bytes));
    }

    match String::from_utf8(bytes) {
        Ok(text) => Ok(ArtifactPayload::Text(text)),
        Err(e) => {
            tracing::debug!(
                "{} is not valid UTF-8, storing its raw bytes",
                path.display()
            );
            Ok(ArtifactPayload::Binary(e.into_bytes()))
        }
    }
}
