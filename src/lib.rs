//! Crawl-Fleet: a distributed crawl work-queue coordinator
//!
//! This crate lets a fleet of crawl workers share one task backlog in a
//! SQLite database. Workers claim tasks atomically, run an external crawler
//! for each, ingest the crawl output (summary, DOMs, stripped DOMs and
//! screenshots) into the same database, and check the task out.

pub mod admin;
pub mod config;
pub mod ingest;
pub mod queue;
pub mod storage;
pub mod worker;

use thiserror::Error;

/// Main error type for Crawl-Fleet operations
#[derive(Debug, Error)]
pub enum FleetError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Queue error: {0}")]
    Queue(#[from] queue::QueueError),

    #[error("Ingestion error: {0}")]
    Ingest(#[from] ingest::IngestError),

    #[error("Crawl error: {0}")]
    Crawl(#[from] worker::CrawlError),

    #[error("URL error: {0}")]
    Url(#[from] UrlError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing domain in URL")]
    MissingDomain,
}

/// Result type alias for Crawl-Fleet operations
pub type Result<T> = std::result::Result<T, FleetError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use ingest::{IngestReport, ResultId, ResultIngestor};
pub use queue::{Task, TaskId, WorkQueue, WorkerIdentity};
pub use worker::{CommandCrawler, Crawler, WorkerLoop, WorkerSettings};
