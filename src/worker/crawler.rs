//! External crawler seam
//!
//! The crawler itself is an opaque collaborator: given a URL and an empty
//! output directory it writes a summary file and per-state subdirectories.

use crate::config::CrawlerConfig;
use std::path::Path;
use std::process::{Command, Stdio};
use thiserror::Error;
use url::Url;

/// Placeholder substituted with the task URL in crawler arguments
pub const URL_PLACEHOLDER: &str = "{url}";

/// Placeholder substituted with the output directory in crawler arguments
pub const OUTPUT_PLACEHOLDER: &str = "{output}";

/// Longest stderr excerpt kept in a crawl error
const STDERR_EXCERPT_LEN: usize = 512;

/// Errors reported by a crawl
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("Crawler rejected URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Failed to start crawler '{program}': {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    #[error("Crawler exited with {status}: {stderr}")]
    ExitStatus { status: String, stderr: String },

    #[error("Crawl aborted: {0}")]
    Aborted(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A crawler that explores one URL and writes its findings to a directory
///
/// Implementations run synchronously; the worker loop moves them onto a
/// blocking thread.
pub trait Crawler: Send + Sync {
    fn crawl(&self, url: &Url, output_dir: &Path) -> Result<(), CrawlError>;
}

impl<F> Crawler for F
where
    F: Fn(&Url, &Path) -> Result<(), CrawlError> + Send + Sync,
{
    fn crawl(&self, url: &Url, output_dir: &Path) -> Result<(), CrawlError> {
        self(url, output_dir)
    }
}

/// Runs an external program for every crawl
///
/// Each configured argument has `{url}` and `{output}` replaced before the
/// program starts. A non-zero exit status is a failed crawl.
#[derive(Debug, Clone)]
pub struct CommandCrawler {
    program: String,
    args: Vec<String>,
}

impl CommandCrawler {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    pub fn from_config(config: &CrawlerConfig) -> Self {
        Self::new(config.program.clone(), config.args.clone())
    }

    /// Builds the argument list for one crawl
    pub fn render_args(&self, url: &Url, output_dir: &Path) -> Vec<String> {
        let output = output_dir.display().to_string();
        self.args
            .iter()
            .map(|arg| {
                arg.replace(URL_PLACEHOLDER, url.as_str())
                    .replace(OUTPUT_PLACEHOLDER, &output)
            })
            .collect()
    }
}

impl Crawler for CommandCrawler {
    fn crawl(&self, url: &Url, output_dir: &Path) -> Result<(), CrawlError> {
        let args = self.render_args(url, output_dir);
        tracing::debug!("Running {} {:?}", self.program, args);

        let output = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .output()
            .map_err(|source| CrawlError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if output.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        let stderr = stderr.trim();
        let excerpt = match stderr.char_indices().rev().nth(STDERR_EXCERPT_LEN) {
            Some((idx, _)) => &stderr[idx..],
            None => stderr,
        };

        Err(CrawlError::ExitStatus {
            status: output.status.to_string(),
            stderr: excerpt.to_string(),
        })
    }
}
