//! Crawl-Fleet main entry point
//!
//! This is the command-line interface for crawl workers and fleet
//! administration.

use anyhow::Context;
use clap::{Parser, Subcommand};
use crawl_fleet::admin::{delete_result_cascade, submit_websites_file};
use crawl_fleet::config::{load_config_with_hash, Config};
use crawl_fleet::storage::SqliteStore;
use crawl_fleet::{
    CommandCrawler, ResultId, ResultIngestor, TaskId, WorkQueue, WorkerLoop, WorkerSettings,
};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Crawl-Fleet: a distributed crawl work-queue coordinator
///
/// Workers share a task backlog in one SQLite database, claim tasks
/// atomically, run the configured crawler and ingest its output.
#[derive(Parser, Debug)]
#[command(name = "crawl-fleet")]
#[command(version = "1.0.0")]
#[command(about = "A distributed crawl work-queue coordinator", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose", global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Poll the backlog and crawl claimed tasks until interrupted
    Worker,

    /// Add websites to the backlog
    Submit {
        /// URLs to submit
        #[arg(required = true)]
        urls: Vec<String>,

        /// Claim the new tasks for this node right away
        #[arg(long)]
        claim: bool,
    },

    /// Submit every URL listed in a websites file (one per line)
    Flush {
        /// Path to the websites file
        file: PathBuf,
    },

    /// Return a claimed task to the unclaimed pool
    Revert {
        /// Task id
        id: i64,
    },

    /// Delete a result, its artifacts and its originating task
    DeleteResult {
        /// Result id
        id: i64,
    },

    /// Show backlog statistics and exit
    Stats,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let config = match load_config_with_hash(&cli.config) {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            cfg
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    let store = SqliteStore::with_busy_timeout(
        Path::new(&config.store.database_path),
        config.store.busy_timeout(),
    )
    .with_context(|| format!("opening database {}", config.store.database_path))?;
    let queue = WorkQueue::new(store.clone(), config.worker.resolve_identity());

    match cli.command {
        Command::Worker => handle_worker(&config, queue, store).await,
        Command::Submit { urls, claim } => handle_submit(&queue, &urls, claim),
        Command::Flush { file } => handle_flush(&queue, &file),
        Command::Revert { id } => handle_revert(&queue, TaskId(id)),
        Command::DeleteResult { id } => handle_delete_result(&store, ResultId(id)),
        Command::Stats => handle_stats(&queue),
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("crawl_fleet=info,warn"),
            1 => EnvFilter::new("crawl_fleet=debug,info"),
            2 => EnvFilter::new("crawl_fleet=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Runs the worker loop until Ctrl-C
async fn handle_worker(
    config: &Config,
    queue: WorkQueue<SqliteStore>,
    store: SqliteStore,
) -> anyhow::Result<()> {
    let settings = WorkerSettings::from(&config.worker);
    std::fs::create_dir_all(&settings.output_root).with_context(|| {
        format!(
            "creating output root {}",
            settings.output_root.display()
        )
    })?;

    tracing::info!(
        "Crawler: {} {:?}, batch size {}, poll interval {:?}",
        config.crawler.program,
        config.crawler.args,
        settings.batch_size,
        settings.poll_interval
    );

    let crawler = CommandCrawler::from_config(&config.crawler);
    let mut worker = WorkerLoop::new(queue, ResultIngestor::new(store), crawler, settings);

    worker
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Could not listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await;

    Ok(())
}

/// Handles the submit command
fn handle_submit(queue: &WorkQueue<SqliteStore>, urls: &[String], claim: bool) -> anyhow::Result<()> {
    let mut failed = 0;
    for url in urls {
        match queue.submit(url, claim) {
            Ok(id) => println!("Submitted {} as task {}", url, id),
            Err(e) => {
                eprintln!("Could not submit {}: {}", url, e);
                failed += 1;
            }
        }
    }

    if failed > 0 {
        anyhow::bail!("{} of {} submissions failed", failed, urls.len());
    }
    Ok(())
}

/// Handles the flush command
fn handle_flush(queue: &WorkQueue<SqliteStore>, file: &Path) -> anyhow::Result<()> {
    let summary = submit_websites_file(queue, file)
        .with_context(|| format!("reading websites file {}", file.display()))?;

    println!("Submitted: {}", summary.submitted.len());
    println!("Rejected:  {}", summary.rejected.len());
    for line in &summary.rejected {
        println!("  - {}", line);
    }
    println!("Failed:    {}", summary.failed.len());

    if !summary.failed.is_empty() {
        anyhow::bail!("{} websites could not be stored", summary.failed.len());
    }
    Ok(())
}

/// Handles the revert command
fn handle_revert(queue: &WorkQueue<SqliteStore>, id: TaskId) -> anyhow::Result<()> {
    if queue.revert(id) {
        println!("Task {} returned to the backlog", id);
        Ok(())
    } else {
        anyhow::bail!("task {} was not reverted", id)
    }
}

/// Handles the delete-result command
fn handle_delete_result(store: &SqliteStore, id: ResultId) -> anyhow::Result<()> {
    let report = delete_result_cascade(store, id);

    println!("Artifacts: {}", report.artifacts);
    println!("Result:    {}", report.result);
    println!("Task:      {}", report.task);

    if !report.is_complete() {
        anyhow::bail!("not all data for result {} could be deleted", id);
    }
    Ok(())
}

/// Handles the stats command
fn handle_stats(queue: &WorkQueue<SqliteStore>) -> anyhow::Result<()> {
    let counts = queue.stats()?;

    println!("Database: {}\n", queue.store().path().display());
    println!("Unclaimed: {}", counts.unclaimed);
    println!("Claimed:   {}", counts.claimed);
    println!("Finished:  {}", counts.finished);
    println!("Total:     {}", counts.total());

    Ok(())
}
