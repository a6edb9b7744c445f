use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use trawl_client::{EndpointConfig, HttpAnalyzer, HttpScrapeWorker};
use trawl_core::job::{Job, ScrapeOptions};
use trawl_core::models::{AiOptions, ScrapeTarget};
use trawl_core::{
    BatchScheduler, JobRegistry, OrchestratorConfig, PipelineController, RetryingFetcher,
};

#[derive(Parser)]
#[command(name = "trawl", version, about = "Scraping job orchestrator")]
struct Cli {
    /// Base URL of the extraction worker
    #[arg(long, global = true)]
    worker_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scrape a list of targets in batches and print the results as JSON
    Scrape {
        /// JSON file holding an array of targets (or an object with a `targets` array)
        #[arg(short, long)]
        targets: PathBuf,

        /// Targets fetched concurrently (overrides TRAWL_BATCH_SIZE)
        #[arg(long)]
        batch_size: Option<usize>,

        /// Pause between batches in milliseconds (overrides TRAWL_BATCH_PAUSE_MS)
        #[arg(long)]
        batch_pause_ms: Option<u64>,

        /// Attempts per target (overrides TRAWL_RETRY_LIMIT)
        #[arg(long)]
        retry_limit: Option<u32>,
    },

    /// Run one scrape job in-process and poll it until it finishes
    Job {
        /// Page to scrape
        #[arg(short, long)]
        url: String,

        /// Run AI analysis after the scrape
        #[arg(long, default_value_t = false)]
        ai: bool,

        /// Base URL of the analysis worker (defaults to the worker URL)
        #[arg(long)]
        ai_url: Option<String>,

        /// Job deadline in seconds
        #[arg(long)]
        timeout_secs: Option<u64>,

        /// Status polling interval in milliseconds
        #[arg(long, default_value_t = 500)]
        poll_interval_ms: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Logs go to stderr; stdout carries the JSON output
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("trawl=info".parse()?))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let cancel = CancellationToken::new();
    let on_ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling outstanding work");
            on_ctrl_c.cancel();
        }
    });

    let config = OrchestratorConfig::from_env().context("Invalid orchestrator configuration")?;

    match cli.command {
        Commands::Scrape {
            targets,
            batch_size,
            batch_pause_ms,
            retry_limit,
        } => {
            let endpoints = endpoint_config(cli.worker_url, None)?;
            let mut config = config;
            if let Some(size) = batch_size {
                config.batch.batch_size = size;
            }
            if let Some(ms) = batch_pause_ms {
                config.batch.batch_pause = Duration::from_millis(ms);
            }
            if let Some(limit) = retry_limit {
                config.retry.max_attempts = limit;
            }
            cmd_scrape(&targets, &config, &endpoints, &cancel).await?;
        }
        Commands::Job {
            url,
            ai,
            ai_url,
            timeout_secs,
            poll_interval_ms,
        } => {
            let endpoints = endpoint_config(cli.worker_url, ai_url)?;
            let mut options = ScrapeOptions::new(url);
            if ai {
                options = options.with_ai(AiOptions::enabled());
            }
            if let Some(secs) = timeout_secs {
                options = options.with_timeout_secs(secs);
            }
            cmd_job(
                options,
                &config,
                &endpoints,
                Duration::from_millis(poll_interval_ms),
                cancel,
            )
            .await?;
        }
    }

    Ok(())
}

/// Endpoint settings from the environment, with command-line overrides applied.
fn endpoint_config(worker_url: Option<String>, ai_url: Option<String>) -> Result<EndpointConfig> {
    EndpointConfig::from_lookup(|name| match name {
        "TRAWL_WORKER_URL" if worker_url.is_some() => worker_url.clone(),
        "TRAWL_AI_URL" if ai_url.is_some() => ai_url.clone(),
        _ => std::env::var(name).ok(),
    })
    .context("Invalid worker endpoint configuration (set TRAWL_WORKER_URL or --worker-url)")
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TargetsFile {
    List(Vec<ScrapeTarget>),
    Wrapped { targets: Vec<ScrapeTarget> },
}

fn load_targets(path: &Path) -> Result<Vec<ScrapeTarget>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read targets file: {}", path.display()))?;
    let file: TargetsFile = serde_json::from_str(&raw)
        .with_context(|| format!("Invalid targets file: {}", path.display()))?;
    Ok(match file {
        TargetsFile::List(targets) | TargetsFile::Wrapped { targets } => targets,
    })
}

async fn cmd_scrape(
    targets_path: &Path,
    config: &OrchestratorConfig,
    endpoints: &EndpointConfig,
    cancel: &CancellationToken,
) -> Result<()> {
    let targets = load_targets(targets_path)?;
    tracing::info!(
        targets = targets.len(),
        batch_size = config.batch.batch_size,
        worker_url = %endpoints.worker_url,
        "Loaded targets"
    );

    let worker = HttpScrapeWorker::from_config(endpoints).context("Failed to create HTTP client")?;
    let scheduler = BatchScheduler::new(
        RetryingFetcher::new(worker, config.retry.clone()),
        config.batch.clone(),
    );

    let results = scheduler
        .scrape_many(&targets, cancel)
        .await
        .map_err(|e| anyhow::anyhow!(e))?;

    let failed = results.iter().filter(|r| !r.success).count();
    tracing::info!(
        succeeded = results.len() - failed,
        failed,
        "Scrape finished"
    );

    println!("{}", serde_json::to_string_pretty(&results)?);

    Ok(())
}

async fn cmd_job(
    options: ScrapeOptions,
    config: &OrchestratorConfig,
    endpoints: &EndpointConfig,
    poll_interval: Duration,
    cancel: CancellationToken,
) -> Result<()> {
    let worker = HttpScrapeWorker::from_config(endpoints).context("Failed to create HTTP client")?;
    let analyzer = HttpAnalyzer::from_config(endpoints).context("Failed to create HTTP client")?;

    let controller = PipelineController::new(Arc::new(JobRegistry::new()), worker, analyzer)
        .with_job_timeout(config.job_timeout)
        .with_shutdown_token(cancel);

    let job_id = controller
        .start(options)
        .map_err(|e| anyhow::anyhow!(e))?;
    tracing::info!(%job_id, "Job started");

    let job = poll_until_done(&controller, job_id, poll_interval).await?;

    println!("{}", serde_json::to_string_pretty(&job)?);

    match job.error {
        Some(error) => anyhow::bail!("Job {job_id} failed: {error}"),
        None => Ok(()),
    }
}

async fn poll_until_done(
    controller: &PipelineController<HttpScrapeWorker, HttpAnalyzer>,
    job_id: Uuid,
    interval: Duration,
) -> Result<Job> {
    let mut last_progress = None;
    loop {
        let job = controller
            .get_status(job_id)
            .with_context(|| format!("Job {job_id} disappeared"))?;

        if last_progress != Some(job.progress) {
            tracing::info!(%job_id, status = %job.status, progress = job.progress, "Job progress");
            last_progress = Some(job.progress);
        }
        if job.status.is_terminal() {
            return Ok(job);
        }
        tokio::time::sleep(interval).await;
    }
}
