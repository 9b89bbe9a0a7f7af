//! Worker loop tests
//!
//! The crawler is a closure writing output the way the external crawler
//! would, so each test drives a full claim, crawl, ingest, checkout cycle.

use crate::{queue_for, temp_store, write_crawl_output};
use crawl_fleet::storage::{
    ArtifactKind, ArtifactPayload, ArtifactRow, ResultRow, ResultStore, SqliteResultSession,
    SqliteStore, StorageResult, TaskStore,
};
use crawl_fleet::worker::{CrawlError, Crawler};
use crawl_fleet::{ResultIngestor, WorkerLoop, WorkerSettings};
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::thread::{self, ThreadId};
use std::time::Duration;
use tempfile::TempDir;
use url::Url;

fn test_settings(output_root: &Path) -> WorkerSettings {
    WorkerSettings {
        batch_size: 1,
        poll_interval: Duration::from_millis(10),
        poll_jitter: Duration::ZERO,
        output_root: output_root.to_path_buf(),
        revert_failed_crawls: true,
        remove_output_after_ingest: false,
    }
}

fn worker_with<C: Crawler + 'static>(
    store: &SqliteStore,
    name: &str,
    crawler: C,
    settings: WorkerSettings,
) -> WorkerLoop<SqliteStore, SqliteStore, C> {
    WorkerLoop::new(
        queue_for(store, name),
        ResultIngestor::new(store.clone()),
        crawler,
        settings,
    )
}

#[tokio::test]
async fn test_submit_crawl_ingest_checkout() {
    let (_dir, store) = temp_store();
    let output_root = TempDir::new().unwrap();
    let id = queue_for(&store, "node-1")
        .submit("http://example.com", false)
        .unwrap();

    let crawler = |_url: &Url, out: &Path| -> Result<(), CrawlError> {
        fs::write(out.join("result.json"), r#"{"states":1}"#)?;
        fs::create_dir_all(out.join("doms"))?;
        fs::write(out.join("doms/s0.html"), "<html><body>home</body></html>")?;
        fs::create_dir_all(out.join("screenshots"))?;
        fs::write(out.join("screenshots/s0.png"), [0x89, b'P', b'N', b'G'])?;
        Ok(())
    };
    let mut worker = worker_with(&store, "node-1", crawler, test_settings(output_root.path()));

    let report = worker.poll_once().await;
    assert_eq!(report.claimed, 1);
    assert_eq!(report.checked_out, 1);

    let task = store.get_task(id.get()).unwrap().unwrap();
    assert!(task.done);
    assert_eq!(task.owner, "node-1");
    assert!(task.finished_at.is_some());

    let results = store.results_for_task(id.get()).unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].summary, r#"{"states":1}"#);
    assert!(results[0].duration_ms >= 0);

    let artifacts = store.list_artifacts(results[0].id).unwrap();
    assert_eq!(artifacts.len(), 2);
    assert!(artifacts.iter().any(|a| a.kind == ArtifactKind::Dom
        && a.state_id == "s0"
        && a.payload == ArtifactPayload::Text("<html><body>home</body></html>".to_string())));
    assert!(artifacts.iter().any(|a| a.kind == ArtifactKind::Screenshot
        && a.state_id == "s0"
        && a.payload == ArtifactPayload::Binary(vec![0x89, b'P', b'N', b'G'])));

    // A finished task is never handed out again
    assert!(queue_for(&store, "node-1").claim(5).unwrap().is_empty());
    assert!(queue_for(&store, "node-2").claim(5).unwrap().is_empty());
    assert_eq!(worker.poll_once().await.claimed, 0);
}

#[tokio::test]
async fn test_partial_ingest_leaves_task_claimed() {
    let (_dir, store) = temp_store();
    let output_root = TempDir::new().unwrap();
    let id = queue_for(&store, "node-1")
        .submit("http://example.com/a", false)
        .unwrap();

    // Two files map to the same state id, so the second insert is rejected
    let crawler = |_url: &Url, out: &Path| -> Result<(), CrawlError> {
        write_crawl_output(out, &["doms"], &["s0"])?;
        fs::write(out.join("doms/s0.htm"), "<html/>")?;
        Ok(())
    };
    let mut worker = worker_with(&store, "node-1", crawler, test_settings(output_root.path()));

    let report = worker.poll_once().await;
    assert_eq!(report.partial, 1);
    assert_eq!(report.checked_out, 0);
    assert!(!report.made_progress());

    let task = store.get_task(id.get()).unwrap().unwrap();
    assert!(!task.done);
    assert_eq!(task.owner, "node-1");
    assert_eq!(store.results_for_task(id.get()).unwrap().len(), 1);

    // The owner gets the task back on its next claim
    let again = queue_for(&store, "node-1").claim(1).unwrap();
    assert_eq!(again.len(), 1);
    assert_eq!(again[0].id, id);
}

#[tokio::test]
async fn test_failed_crawl_is_reverted() {
    let (_dir, store) = temp_store();
    let output_root = TempDir::new().unwrap();
    let id = queue_for(&store, "node-1")
        .submit("https://example.org/", false)
        .unwrap();

    let crawler = |url: &Url, _out: &Path| -> Result<(), CrawlError> {
        Err(CrawlError::Aborted(format!("browser crashed on {}", url)))
    };
    let mut worker = worker_with(&store, "node-1", crawler, test_settings(output_root.path()));

    let report = worker.poll_once().await;
    assert_eq!(report.crawl_failures, 1);
    assert_eq!(report.reverted, 1);

    let task = store.get_task(id.get()).unwrap().unwrap();
    assert_eq!(task.owner, "");
    assert!(!task.done);
    assert!(store.results_for_task(id.get()).unwrap().is_empty());

    // Any worker may pick it up again
    assert_eq!(queue_for(&store, "node-2").claim(1).unwrap()[0].id, id);
}

#[tokio::test]
async fn test_failed_crawl_kept_when_revert_disabled() {
    let (_dir, store) = temp_store();
    let output_root = TempDir::new().unwrap();
    let id = queue_for(&store, "node-1")
        .submit("https://example.org/", false)
        .unwrap();

    let crawler =
        |_url: &Url, _out: &Path| -> Result<(), CrawlError> { Err(CrawlError::Aborted("x".into())) };
    let settings = WorkerSettings {
        revert_failed_crawls: false,
        ..test_settings(output_root.path())
    };
    let mut worker = worker_with(&store, "node-1", crawler, settings);

    let report = worker.poll_once().await;
    assert_eq!(report.crawl_failures, 1);
    assert_eq!(report.reverted, 0);
    assert_eq!(store.get_task(id.get()).unwrap().unwrap().owner, "node-1");
}

#[tokio::test]
async fn test_missing_summary_fails_ingestion() {
    let (_dir, store) = temp_store();
    let output_root = TempDir::new().unwrap();
    let id = queue_for(&store, "node-1")
        .submit("http://example.com/", false)
        .unwrap();

    let crawler = |_url: &Url, out: &Path| -> Result<(), CrawlError> {
        fs::create_dir_all(out.join("doms"))?;
        fs::write(out.join("doms/s0.html"), "<html/>")?;
        Ok(())
    };
    let mut worker = worker_with(&store, "node-1", crawler, test_settings(output_root.path()));

    let report = worker.poll_once().await;
    assert_eq!(report.ingest_failures, 1);
    assert!(!store.get_task(id.get()).unwrap().unwrap().done);
    assert!(store.results_for_task(id.get()).unwrap().is_empty());
}

#[tokio::test]
async fn test_output_removed_after_checkout() {
    let (_dir, store) = temp_store();
    let output_root = TempDir::new().unwrap();
    let id = queue_for(&store, "node-1")
        .submit("http://example.com/", false)
        .unwrap();

    let crawler = |_url: &Url, out: &Path| -> Result<(), CrawlError> {
        write_crawl_output(out, &["doms", "strippedDOM", "screenshots"], &["s0"])?;
        Ok(())
    };
    let settings = WorkerSettings {
        remove_output_after_ingest: true,
        ..test_settings(output_root.path())
    };
    let mut worker = worker_with(&store, "node-1", crawler, settings);

    assert_eq!(worker.poll_once().await.checked_out, 1);
    assert!(!output_root.path().join(format!("task-{}", id)).exists());
}

#[tokio::test]
async fn test_run_until_stops_on_shutdown() {
    let (_dir, store) = temp_store();
    let output_root = TempDir::new().unwrap();
    let id = queue_for(&store, "node-1")
        .submit("http://example.com/", false)
        .unwrap();

    let crawler = |_url: &Url, out: &Path| -> Result<(), CrawlError> {
        write_crawl_output(out, &["doms"], &["s0"])?;
        Ok(())
    };
    let mut worker = worker_with(&store, "node-1", crawler, test_settings(output_root.path()));

    let (tx, rx) = tokio::sync::oneshot::channel::<()>();
    tx.send(()).unwrap();
    tokio::time::timeout(
        Duration::from_secs(10),
        worker.run_until(async {
            let _ = rx.await;
        }),
    )
    .await
    .expect("Worker did not stop");

    // The cycle in progress when shutdown arrived ran to completion
    assert!(store.get_task(id.get()).unwrap().unwrap().done);
}

/// Result store that records which thread opened each ingestion session
struct ThreadRecordingStore {
    inner: SqliteStore,
    session_threads: Arc<Mutex<Vec<ThreadId>>>,
}

impl ResultStore for ThreadRecordingStore {
    type Session = SqliteResultSession;

    fn open_session(&self) -> StorageResult<SqliteResultSession> {
        self.session_threads.lock().unwrap().push(thread::current().id());
        self.inner.open_session()
    }

    fn get_result(&self, result_id: i64) -> StorageResult<Option<ResultRow>> {
        self.inner.get_result(result_id)
    }

    fn results_for_task(&self, task_id: i64) -> StorageResult<Vec<ResultRow>> {
        self.inner.results_for_task(task_id)
    }

    fn list_artifacts(&self, result_id: i64) -> StorageResult<Vec<ArtifactRow>> {
        self.inner.list_artifacts(result_id)
    }

    fn delete_artifacts(&self, result_id: i64) -> StorageResult<usize> {
        self.inner.delete_artifacts(result_id)
    }

    fn delete_result(&self, result_id: i64) -> StorageResult<usize> {
        self.inner.delete_result(result_id)
    }
}

#[tokio::test]
async fn test_ingestion_runs_off_the_async_thread() {
    let (_dir, store) = temp_store();
    let output_root = TempDir::new().unwrap();
    let id = queue_for(&store, "node-1")
        .submit("http://example.com/", false)
        .unwrap();

    let session_threads = Arc::new(Mutex::new(Vec::new()));
    let results = ThreadRecordingStore {
        inner: store.clone(),
        session_threads: Arc::clone(&session_threads),
    };
    let crawler = |_url: &Url, out: &Path| -> Result<(), CrawlError> {
        write_crawl_output(out, &["doms"], &["s0"])?;
        Ok(())
    };
    let mut worker = WorkerLoop::new(
        queue_for(&store, "node-1"),
        ResultIngestor::new(results),
        crawler,
        test_settings(output_root.path()),
    );

    assert_eq!(worker.poll_once().await.checked_out, 1);
    assert!(store.get_task(id.get()).unwrap().unwrap().done);

    // The current-thread test runtime polls the loop on this thread
    let threads = session_threads.lock().unwrap();
    assert_eq!(threads.len(), 1);
    assert_ne!(threads[0], thread::current().id());
}
