//! Worker module
//!
//! This module contains the polling worker and its seam to the external
//! crawler:
//! - `Crawler`: the opaque crawl step, with a command-line implementation
//! - `WorkerLoop`: claim, crawl, ingest and check out, forever

mod crawler;
mod runner;

pub use crawler::{CommandCrawler, CrawlError, Crawler, OUTPUT_PLACEHOLDER, URL_PLACEHOLDER};
pub use runner::{CycleReport, TaskOutcome, WorkerLoop, WorkerPhase, WorkerSettings};
