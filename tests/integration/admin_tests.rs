//! Administrative command tests

use crate::{queue_for, temp_store, write_crawl_output};
use crawl_fleet::admin::{delete_result_cascade, submit_websites_file, StepOutcome};
use crawl_fleet::storage::{ResultStore, TaskStore};
use crawl_fleet::{ResultId, ResultIngestor, TaskId};
use std::fs;
use std::time::Duration;
use tempfile::TempDir;

#[test]
fn test_delete_ingested_result_cascades() {
    let (_dir, store) = temp_store();
    let queue = queue_for(&store, "node-1");
    let id = queue.submit("http://example.com/", true).unwrap();

    let output = TempDir::new().unwrap();
    write_crawl_output(output.path(), &["doms", "screenshots"], &["s0", "s1"]).unwrap();
    let report = ResultIngestor::new(store.clone())
        .ingest(id, output.path(), Duration::from_millis(20))
        .unwrap();
    assert!(queue.checkout(id));

    let deleted = delete_result_cascade(&store, report.result_id);

    assert!(deleted.is_complete());
    assert_eq!(deleted.task_id, Some(id));
    assert_eq!(deleted.artifacts, StepOutcome::Deleted(4));
    assert!(store.get_result(report.result_id.get()).unwrap().is_none());
    assert!(store.list_artifacts(report.result_id.get()).unwrap().is_empty());
    assert!(store.get_task(id.get()).unwrap().is_none());
}

#[test]
fn test_delete_leaves_other_results() {
    let (_dir, store) = temp_store();
    let queue = queue_for(&store, "node-1");
    let first = queue.submit("http://a.test/", true).unwrap();
    let second = queue.submit("http://b.test/", true).unwrap();

    let ingestor = ResultIngestor::new(store.clone());
    let output = TempDir::new().unwrap();
    write_crawl_output(output.path(), &["doms"], &["s0"]).unwrap();
    let kept = ingestor.ingest(second, output.path(), Duration::ZERO).unwrap();
    let dropped = ingestor.ingest(first, output.path(), Duration::ZERO).unwrap();

    assert!(delete_result_cascade(&store, dropped.result_id).is_complete());

    assert!(store.get_result(kept.result_id.get()).unwrap().is_some());
    assert_eq!(store.list_artifacts(kept.result_id.get()).unwrap().len(), 1);
    assert!(store.get_task(second.get()).unwrap().is_some());
}

#[test]
fn test_delete_unknown_result_is_incomplete() {
    let (_dir, store) = temp_store();
    let report = delete_result_cascade(&store, ResultId(404));
    assert!(!report.is_complete());
    assert_eq!(report.task, StepOutcome::NothingToDelete);
}

#[test]
fn test_flush_websites_file() {
    let (dir, store) = temp_store();
    let queue = queue_for(&store, "node-1");
    let path = dir.path().join("websites.txt");
    fs::write(
        &path,
        "# crawl list\nhttp://a.test/\nhttps://b.test/\n\nmailto:someone@c.test\n",
    )
    .unwrap();

    let summary = submit_websites_file(&queue, &path).unwrap();

    assert_eq!(summary.submitted, vec![TaskId(1), TaskId(2)]);
    assert_eq!(summary.rejected.len(), 1);
    assert_eq!(store.count_tasks().unwrap().unclaimed, 2);
}
