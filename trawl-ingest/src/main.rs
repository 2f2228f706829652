//! Trawl Ingest binary
//!
//! Runs one ingestion job against PostgreSQL and exits. Ctrl-C cancels the
//! run at the next batch boundary or item suspension point.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use trawl_client::TwitterClient;
use trawl_ingest::config::Config;
use trawl_ingest::connector::BoundedConnector;
use trawl_ingest::pipeline::IngestionPipeline;
use trawl_ingest::repository::db::{create_pool, run_migrations};
use trawl_ingest::repository::{PgTweetRepository, PgUserRepository, TweetStore, UserStore};
use trawl_ingest::scheduler::{RunReport, RunStatus};
use trawl_ingest::service::{
    AuthorRepairService, CsvLoaderService, TweetCrawlService, parse_tweet_row,
};
use trawl_ingest::sink::{FailureSink, FileFailureSink};

#[derive(Parser)]
#[command(name = "trawl-ingest")]
#[command(about = "Rate-adaptive tweet ingestion", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch every tweet listed in the labeled dataset
    Tweets {
        /// Dataset to read instead of DATASET_PATH
        dataset: Option<PathBuf>,
    },

    /// Fetch the authors of stored tweets that are not stored yet
    Users,

    /// Bulk load an `id,user_id,label,text` export
    LoadCsv {
        /// Export to load
        path: PathBuf,

        /// Treat the first row as data instead of a header
        #[arg(long)]
        no_header: bool,
    },

    /// Resolve the author of stored tweets that have none
    FixAuthors,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "trawl_ingest=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    info!("Starting Trawl Ingest");

    // Load configuration
    let config = load_config()?;
    info!(
        "Loaded configuration: twitter_api_url={}, batch_size={}, tick_interval={:?}",
        config.twitter_api_url, config.batch_size, config.tick_interval
    );

    // Initialize storage
    let pool = create_pool(&config.database_url, config.max_connections)
        .await
        .context("Failed to connect to database")?;
    run_migrations(&pool)
        .await
        .context("Failed to run database migrations")?;

    let tweets: Arc<TweetStore> = Arc::new(PgTweetRepository::new(pool.clone()));
    let users: Arc<UserStore> = Arc::new(PgUserRepository::new(pool));
    let sink: Arc<dyn FailureSink> = Arc::new(FileFailureSink::new(&config.failure_log_path));

    info!("Storage initialized (pool size: {})", tweets.pool_size());

    let cancel = CancellationToken::new();
    spawn_ctrl_c_handler(cancel.clone());

    match cli.command {
        Commands::Tweets { dataset } => {
            let dataset = dataset.unwrap_or_else(|| config.dataset_path.clone());
            let service = crawl_service(&config, tweets, users, sink)?;
            let mut ticker = service.ticker();
            let report = service.crawl_tweets(&dataset, &mut ticker, &cancel).await?;
            log_report("tweets", &report);
        }
        Commands::Users => {
            let service = crawl_service(&config, tweets, users, sink)?;
            let mut ticker = service.ticker();
            let report = service.crawl_users(&mut ticker, &cancel).await?;
            log_report("users", &report);
        }
        Commands::LoadCsv { path, no_header } => {
            let scheduler = config.csv_scheduler_config(tweets.pool_size());
            let service = CsvLoaderService::new(tweets, sink, scheduler)?;
            let mut ticker = service.ticker();

            // Drops the first non-blank row
            let header_pending = AtomicBool::new(!no_header);
            let filter = move |_: &str| !header_pending.swap(false, Ordering::Relaxed);
            let report = service
                .load_csv(&path, filter, parse_tweet_row, &mut ticker, &cancel)
                .await?;
            log_report("load-csv", &report);
        }
        Commands::FixAuthors => {
            require_bearer_token(&config);
            let client = Arc::new(TwitterClient::new(
                config.twitter_api_url.clone(),
                config.bearer_token.clone(),
            ));
            let service = AuthorRepairService::new(
                tweets,
                client.clone(),
                client,
                sink,
                config.tick_interval,
            )
            .with_retry_policy(config.retry_policy());
            let mut ticker = service.ticker();

            let report = service.fix_missing(&mut ticker, &cancel).await?;
            info!(
                "fix-authors {:?}: {} examined, {} fixed, {} not found, {} failed",
                report.status, report.examined, report.fixed, report.not_found, report.failed
            );
        }
    }

    Ok(())
}

/// Loads configuration from environment variables with fallback to defaults
fn load_config() -> Result<Config> {
    match Config::from_env() {
        Ok(config) => {
            config.validate()?;
            Ok(config)
        }
        Err(_) => {
            info!("Failed to load config from environment, using defaults");
            let config = Config::default();
            config.validate()?;
            Ok(config)
        }
    }
}

fn require_bearer_token(config: &Config) {
    if config.bearer_token.is_empty() {
        warn!("TWITTER_BEARER_TOKEN is not set, upstream requests will be rejected");
    }
}

/// Builds the crawl service with one scheduler slot per pooled connection
fn crawl_service(
    config: &Config,
    tweets: Arc<TweetStore>,
    users: Arc<UserStore>,
    sink: Arc<dyn FailureSink>,
) -> Result<TweetCrawlService> {
    require_bearer_token(config);

    let client = Arc::new(TwitterClient::new(
        config.twitter_api_url.clone(),
        config.bearer_token.clone(),
    ));
    let pipeline = IngestionPipeline::new(
        config.batch_size,
        config.scheduler_config(tweets.pool_size()),
    )?;

    Ok(TweetCrawlService::new(
        tweets,
        users,
        client.clone(),
        client,
        sink,
        pipeline,
    )
    .with_excluded_labels(config.excluded_labels.clone()))
}

/// Cancels `cancel` on the first Ctrl-C
fn spawn_ctrl_c_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                warn!("Interrupt received, stopping after the current step");
                cancel.cancel();
            }
            Err(e) => warn!("Failed to listen for Ctrl-C: {}", e),
        }
    });
}

fn log_report<T>(name: &str, report: &RunReport<T>) {
    let verb = match report.status {
        RunStatus::Completed => "completed",
        RunStatus::Cancelled => "cancelled",
        RunStatus::Aborted => "aborted",
    };

    info!(
        "{} {}: {}/{} batch(es), {} processed, {} failed, {} tick(s), {} retry attempt(s)",
        name,
        verb,
        report.batches_completed,
        report.batch_count,
        report.processed_count,
        report.failed_items.len(),
        report.ticks,
        report.retries
    );
}
