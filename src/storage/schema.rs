//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the crawl-fleet database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Shared backlog of crawl tasks
CREATE TABLE IF NOT EXISTS workload (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    url TEXT NOT NULL,
    worker TEXT NOT NULL DEFAULT '',
    crawled INTEGER NOT NULL DEFAULT 0,
    claimed_at TEXT,
    finished_at TEXT
);

CREATE INDEX IF NOT EXISTS idx_workload_owner ON workload(worker, crawled);

-- One row per ingested crawl summary
CREATE TABLE IF NOT EXISTS website_results (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    work_task_id INTEGER NOT NULL,
    summary TEXT NOT NULL,
    duration_ms INTEGER NOT NULL,
    ingested_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_website_results_task ON website_results(work_task_id);

-- Per-state payloads belonging to a result
CREATE TABLE IF NOT EXISTS state_artifacts (
    result_id INTEGER NOT NULL,
    state_id TEXT NOT NULL,
    kind TEXT NOT NULL,
    text_content TEXT,
    blob_content BLOB,
    PRIMARY KEY (result_id, state_id, kind)
);
"#;

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - The database connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
