//! Configuration module for crawl-fleet
//!
//! This module handles loading, parsing, and validating the TOML
//! configuration shared by the worker and administrative commands.
//!
//! # Example
//!
//! ```no_run
//! use crawl_fleet::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("fleet.toml")).unwrap();
//! println!("Polling every {}ms", config.worker.poll_interval_ms);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{Config, CrawlerConfig, StoreConfig, WorkerConfig};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
