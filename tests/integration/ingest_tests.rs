//! Ingestion tests against a SQLite result store

use crate::{temp_store, write_crawl_output};
use crawl_fleet::ingest::IngestError;
use crawl_fleet::storage::{ArtifactKind, ArtifactPayload, ResultStore};
use crawl_fleet::{ResultIngestor, TaskId};
use std::fs;
use std::time::Duration;
use tempfile::TempDir;

#[test]
fn test_ingest_three_states_per_kind() {
    let (_dir, store) = temp_store();
    let output = TempDir::new().unwrap();
    write_crawl_output(
        output.path(),
        &["doms", "strippedDOM", "screenshots"],
        &["state0", "state1", "state2"],
    )
    .unwrap();

    let ingestor = ResultIngestor::new(store.clone());
    let report = ingestor
        .ingest(TaskId(7), output.path(), Duration::from_millis(1500))
        .unwrap();

    assert!(report.is_complete());
    assert_eq!(report.uploaded_count(), 9);

    let result = store.get_result(report.result_id.get()).unwrap().unwrap();
    assert_eq!(result.task_id, 7);
    assert_eq!(result.duration_ms, 1500);
    assert_eq!(result.summary, r#"{"states":3,"edges":2}"#);

    let artifacts = store.list_artifacts(report.result_id.get()).unwrap();
    assert_eq!(artifacts.len(), 9);
    for kind in ArtifactKind::ALL {
        let states: Vec<&str> = artifacts
            .iter()
            .filter(|a| a.kind == kind)
            .map(|a| a.state_id.as_str())
            .collect();
        assert_eq!(states, vec!["state0", "state1", "state2"], "kind {}", kind);
    }
    assert!(artifacts
        .iter()
        .filter(|a| a.kind == ArtifactKind::Screenshot)
        .all(|a| matches!(a.payload, ArtifactPayload::Binary(_))));
}

#[test]
fn test_ingest_without_summary_stores_nothing() {
    let (_dir, store) = temp_store();
    let output = TempDir::new().unwrap();
    fs::create_dir_all(output.path().join("doms")).unwrap();
    fs::write(output.path().join("doms/state0.html"), "<html/>").unwrap();

    let ingestor = ResultIngestor::new(store.clone());
    let result = ingestor.ingest(TaskId(1), output.path(), Duration::ZERO);

    assert!(matches!(result, Err(IngestError::MissingArtifact { .. })));
    assert!(store.results_for_task(1).unwrap().is_empty());
}

#[test]
fn test_ingest_duplicate_state_is_partial() {
    let (_dir, store) = temp_store();
    let output = TempDir::new().unwrap();
    write_crawl_output(output.path(), &["doms"], &["state0"]).unwrap();
    fs::write(output.path().join("doms/state0.htm"), "<html/>").unwrap();

    let ingestor = ResultIngestor::new(store.clone());
    let report = ingestor
        .ingest(TaskId(2), output.path(), Duration::ZERO)
        .unwrap();

    assert!(!report.is_complete());
    assert_eq!(report.dom.uploaded, vec!["state0"]);
    assert_eq!(report.dom.failures.len(), 1);
    assert!(!report.stripped_dom.directory_found);
    assert_eq!(store.list_artifacts(report.result_id.get()).unwrap().len(), 1);
}

#[test]
fn test_ingest_keeps_non_utf8_dom_bytes() {
    let (_dir, store) = temp_store();
    let output = TempDir::new().unwrap();
    write_crawl_output(output.path(), &["doms"], &["s1"]).unwrap();
    let raw = vec![b'<', 0xff, 0xfe, b'>'];
    fs::write(output.path().join("doms/s0.html"), &raw).unwrap();

    let report = ResultIngestor::new(store.clone())
        .ingest(TaskId(3), output.path(), Duration::ZERO)
        .unwrap();
    assert!(report.is_complete());
    assert_eq!(report.dom.uploaded, vec!["s0", "s1"]);

    let artifacts = store.list_artifacts(report.result_id.get()).unwrap();
    let s0 = artifacts.iter().find(|a| a.state_id == "s0").unwrap();
    assert_eq!(s0.kind, ArtifactKind::Dom);
    assert_eq!(s0.payload, ArtifactPayload::Binary(raw));
    let s1 = artifacts.iter().find(|a| a.state_id == "s1").unwrap();
    assert!(matches!(s1.payload, ArtifactPayload::Text(_)));
}

#[test]
fn test_ingest_skips_hidden_files() {
    let (_dir, store) = temp_store();
    let output = TempDir::new().unwrap();
    write_crawl_output(output.path(), &["doms"], &["s0"]).unwrap();
    fs::write(output.path().join("doms/.DS_Store"), [0u8; 4]).unwrap();
    fs::write(output.path().join("doms/.html"), "<html/>").unwrap();

    let report = ResultIngestor::new(store.clone())
        .ingest(TaskId(4), output.path(), Duration::ZERO)
        .unwrap();

    assert!(report.is_complete());
    assert_eq!(report.dom.uploaded, vec!["s0"]);
    assert_eq!(store.list_artifacts(report.result_id.get()).unwrap().len(), 1);
}
