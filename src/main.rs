//! Ark-Harvest main entry point
//!
//! This is the command-line interface for the Ark-Harvest pipeline.

use anyhow::Context;
use ark_harvest::config::{load_config_with_hash, Config};
use ark_harvest::events::{EventBus, LoggingHandler};
use ark_harvest::output::{load_statistics, print_statistics};
use ark_harvest::pipeline::{build_orchestrator, reconcile_stale_jobs, PipelineScheduler};
use ark_harvest::storage::{lock, open_storage, SharedStorage};
use ark_harvest::{JobType, UrlType};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Ark-Harvest: a recurring harvesting pipeline for an animal-shelter site
///
/// Discovers pages from the sitemap, scrapes adoptable-animal profiles and
/// content pages under rate limits, and keeps a SQLite record of every job,
/// URL and entity.
#[derive(Parser, Debug)]
#[command(name = "ark-harvest")]
#[command(version)]
#[command(about = "Harvest adoptable animals and site content", long_about = None)]
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
    /// Run one job now and exit
    Run {
        #[arg(value_enum, default_value_t = JobArg::Full)]
        job: JobArg,
    },

    /// Run the scheduler until Ctrl-C
    Serve,

    /// Print the categorized sitemap without scraping
    Discover {
        /// Print one priority-ordered list of scrapable URLs instead of groups
        #[arg(long)]
        scrapable: bool,
    },

    /// Retry every failed URL still under the retry cap
    RetryFailed,

    /// Close jobs stuck in RUNNING
    Reconcile {
        /// Age in minutes after which a RUNNING job is stale
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
        stale_minutes: Option<u32>,
    },

    /// Show statistics from the database and exit
    Stats,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum JobArg {
    Full,
    Entities,
    Content,
}

impl From<JobArg> for JobType {
    fn from(arg: JobArg) -> Self {
        match arg {
            JobArg::Full => JobType::Full,
            JobArg::Entities => JobType::EntitiesOnly,
            JobArg::Content => JobType::ContentOnly,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    match cli.command {
        Command::Run { job } => handle_run(&config, job.into()).await,
        Command::Serve => handle_serve(config).await,
        Command::Discover { scrapable } => handle_discover(&config, scrapable).await,
        Command::RetryFailed => handle_retry_failed(&config).await,
        Command::Reconcile { stale_minutes } => handle_reconcile(&config, stale_minutes),
        Command::Stats => handle_stats(&config),
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("ark_harvest=info,warn"),
            1 => EnvFilter::new("ark_harvest=debug,info"),
            2 => EnvFilter::new("ark_harvest=trace,debug"),
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

fn open(config: &Config) -> anyhow::Result<SharedStorage> {
    let path = Path::new(&config.output.database_path);
    open_storage(path).with_context(|| format!("Failed to open database {}", path.display()))
}

async fn handle_run(config: &Config, job_type: JobType) -> anyhow::Result<()> {
    let bus = EventBus::new();
    bus.on_any(Arc::new(LoggingHandler));

    let orchestrator = build_orchestrator(config, open(config)?, bus).await?;
    let summary = orchestrator.run(job_type).await?;

    println!("=== Job #{} ({}) {} ===", summary.job_id, summary.job_type, summary.status);
    println!("  Discovered: {}", summary.counts.discovered);
    println!("  Scraped: {}", summary.counts.scraped);
    println!("  Failed: {}", summary.counts.failed);
    if !summary.removed.is_empty() {
        println!("  Removed entities: {}", summary.removed.join(", "));
    }
    Ok(())
}

async fn handle_serve(config: Config) -> anyhow::Result<()> {
    let storage = open(&config)?;

    let stale = chrono::Duration::minutes(config.pipeline.stale_job_minutes);
    let reconciled = reconcile_stale_jobs(&storage, stale)?;
    if !reconciled.is_empty() {
        tracing::warn!("Reconciled {} stale job(s) left by a previous run", reconciled.len());
    }

    let bus = EventBus::new();
    bus.on_any(Arc::new(LoggingHandler));

    let orchestrator = Arc::new(build_orchestrator(&config, storage, bus).await?);
    let scheduler = PipelineScheduler::new(orchestrator, config.schedule.clone());
    scheduler.start().await?;

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;
    tracing::info!("Received shutdown signal");

    scheduler.shutdown().await?;
    tracing::info!("Scheduler shutdown complete");
    Ok(())
}

async fn handle_discover(config: &Config, scrapable: bool) -> anyhow::Result<()> {
    let orchestrator = build_orchestrator(config, open(config)?, EventBus::new()).await?;

    if scrapable {
        let urls = orchestrator.scrapable().await;
        println!("=== Scrapable URLs ({}) ===\n", urls.len());
        for categorized_url in urls {
            println!(
                "  [{}] {} {}",
                categorized_url.priority, categorized_url.url_type, categorized_url.url
            );
        }
        return Ok(());
    }

    let categorized = orchestrator.discover().await;

    println!("=== Sitemap Discovery ===\n");
    for url_type in UrlType::all() {
        let urls = categorized.get(&url_type).map(Vec::as_slice).unwrap_or_default();
        println!("{} ({}):", url_type, urls.len());
        for categorized_url in urls {
            println!("  [{}] {}", categorized_url.priority, categorized_url.url);
        }
        println!();
    }
    Ok(())
}

async fn handle_retry_failed(config: &Config) -> anyhow::Result<()> {
    let bus = EventBus::new();
    bus.on_any(Arc::new(LoggingHandler));

    let orchestrator = build_orchestrator(config, open(config)?, bus).await?;
    let report = orchestrator.retry_failed_urls().await?;

    println!("Retried: {}", report.retried);
    println!("Recovered: {}", report.recovered);
    println!("Still failed: {}", report.still_failed);
    Ok(())
}

fn handle_reconcile(config: &Config, stale_minutes: Option<u32>) -> anyhow::Result<()> {
    let minutes = stale_minutes
        .map(i64::from)
        .unwrap_or(config.pipeline.stale_job_minutes);
    let reconciled = reconcile_stale_jobs(&open(config)?, chrono::Duration::minutes(minutes))?;

    if reconciled.is_empty() {
        println!("No RUNNING jobs older than {} minutes", minutes);
    }
    for job in reconciled {
        println!(
            "Job #{} ({}) -> {} ({} scraped, {} failed)",
            job.job_id, job.job_type, job.status, job.counts.scraped, job.counts.failed
        );
    }
    Ok(())
}

fn handle_stats(config: &Config) -> anyhow::Result<()> {
    let storage = open(config)?;
    let stats = {
        let guard = lock(&storage)?;
        load_statistics(&*guard)?
    };
    print_statistics(&stats);
    Ok(())
}
