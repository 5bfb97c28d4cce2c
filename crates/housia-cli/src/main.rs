use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use housia_client::{
    BrokerConfig, DelegateConfig, HttpScrapeDelegate, RabbitBroker, RedisStatusStore,
    StatusStoreConfig,
};
use housia_core::config::{DEFAULT_QUEUE, SubmissionConfig, WorkerConfig};
use housia_core::traits::{Broker, StatusStore};
use housia_core::{AppError, SubmissionGateway, TracingWorkerReporter, WorkerService};
use housia_db::{Database, DatabaseConfig};

#[derive(Parser)]
#[command(name = "housia", version, about = "Asynchronous listing scraping pipeline")]
struct Cli {
    /// Durable queue carrying scrape jobs
    #[arg(long, global = true, env = "HOUSIA_QUEUE", default_value = DEFAULT_QUEUE)]
    queue: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Consume scrape jobs until Ctrl-C, then drain in-flight jobs
    Worker {
        /// Maximum number of jobs processed at once
        #[arg(short, long, env = "HOUSIA_CONCURRENCY", default_value_t = 3)]
        concurrency: usize,

        /// Identifier used in logs
        #[arg(long, env = "HOUSIA_WORKER_ID")]
        worker_id: Option<String>,
    },

    /// Queue a listing url for scraping
    Submit {
        /// Listing url
        #[arg(short, long)]
        url: String,

        /// Retry budget for the new job
        #[arg(long, env = "HOUSIA_MAX_RETRIES", default_value_t = 3)]
        max_retries: u32,
    },

    /// Show the last known status of a job
    Status {
        /// Job id returned by `submit`
        job_id: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("housia=info".parse()?))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Worker {
            concurrency,
            worker_id,
        } => {
            let mut config = WorkerConfig::default()
                .with_concurrency(concurrency)
                .with_queue(cli.queue);
            if let Some(id) = worker_id {
                config = config.with_worker_id(id);
            }
            cmd_worker(config).await?;
        }
        Commands::Submit { url, max_retries } => {
            let config = SubmissionConfig::default()
                .with_queue(cli.queue)
                .with_max_retries(max_retries);
            cmd_submit(&url, config).await?;
        }
        Commands::Status { job_id } => {
            cmd_status(&job_id).await?;
        }
    }

    Ok(())
}

async fn cmd_worker(config: WorkerConfig) -> Result<()> {
    config.validate()?;

    let broker = RabbitBroker::connect(&BrokerConfig::from_env()?.with_queue(&config.queue))
        .await
        .context("Failed to connect to the broker")?;
    let db = Database::connect(&DatabaseConfig::from_env()?).await?;
    let status = RedisStatusStore::connect(&StatusStoreConfig::from_env()?).await?;
    let delegate = HttpScrapeDelegate::new(&DelegateConfig::from_env()?)?;

    let worker = WorkerService::new(
        broker,
        delegate,
        db.prompt_repo(),
        db.listing_repo(),
        status,
        config,
    );

    let cancel = CancellationToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => tracing::info!("Shutdown signal received, draining"),
            Err(e) => tracing::error!(error = %e, "Failed to listen for Ctrl-C"),
        }
        signal_token.cancel();
    });

    worker
        .run(cancel, Arc::new(TracingWorkerReporter))
        .await
        .context("Worker stopped on a broker failure")?;
    Ok(())
}

async fn cmd_submit(url: &str, config: SubmissionConfig) -> Result<()> {
    let broker = RabbitBroker::connect(&BrokerConfig::from_env()?.with_queue(&config.queue))
        .await
        .context("Failed to connect to the broker")?;
    let db = Database::connect(&DatabaseConfig::from_env()?).await?;
    let status = RedisStatusStore::connect(&StatusStoreConfig::from_env()?).await?;

    let gateway = SubmissionGateway::new(broker.clone(), db.listing_repo(), status, config);
    let result = gateway.submit(url).await;
    broker.close().await?;

    match result {
        Ok(descriptor) => {
            println!("{}", serde_json::to_string_pretty(&descriptor)?);
            Ok(())
        }
        Err(AppError::DuplicateError(url)) => {
            anyhow::bail!("{url} is already stored, nothing queued")
        }
        Err(e) => Err(e.into()),
    }
}

async fn cmd_status(job_id: &str) -> Result<()> {
    let status = RedisStatusStore::connect(&StatusStoreConfig::from_env()?).await?;

    match status.get(job_id.trim()).await? {
        Some(record) => println!("{}", serde_json::to_string_pretty(&record)?),
        None => println!("Job {job_id} not found"),
    }
    Ok(())
}
