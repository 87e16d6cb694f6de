//! cadence: timed social post scheduling and dispatch.
//!
//! Subcommands:
//! - `scheduler`: claimer loop (claim due posts, reap stuck ones, drift check)
//! - `worker`: publish worker pool consuming the dispatch queue
//! - `batch`: commit or preflight a weekly plan for an account
//! - `accounts` / `freeze` / `unfreeze`: account administration
//! - `migrate`: run database migrations

use std::sync::Arc;

use clap::{Parser, Subcommand};
use miette::Result;
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cadence_graph::GraphClient;
use cadence_model::PipelineConfig;
use cadence_planner::{BatchCommitter, BatchRequest, LocalReportSink, WeeklyPlanInput};
use cadence_publisher::{run_workers, Publisher, WorkerOptions};
use cadence_queue::RedisQueue;
use cadence_scheduler::Claimer;
use cadence_store::PgStore;

/// Parse boolean from environment variable, accepting common truthy values.
fn parse_bool_env(s: &str) -> Result<bool, String> {
    match s.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(format!(
            "invalid boolean value '{s}', expected 1/true/yes/on or 0/false/no/off"
        )),
    }
}

#[derive(Parser)]
#[command(name = "cadence")]
#[command(about = "Timed social post scheduling and dispatch", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the claimer loop (claim due posts, reap stuck ones)
    Scheduler {
        /// Postgres connection string
        #[arg(long, env = "DATABASE_URL")]
        database_url: String,

        /// Redis connection string for the dispatch queue
        #[arg(long, env = "REDIS_URL", default_value = "redis://redis:6379/0")]
        redis_url: String,

        /// Dispatch queue name
        #[arg(long, env = "PUBLISH_QUEUE", default_value = "publish")]
        queue: String,

        /// How far ahead a scheduled post becomes claimable, in seconds
        #[arg(long, env = "LOOKAHEAD_SEC", default_value = "30")]
        lookahead_secs: u64,

        /// Claim loop cadence in seconds
        #[arg(long, env = "SCHEDULER_TICK_SEC", default_value = "10")]
        tick_secs: u64,

        /// Reap posts stuck in publishing after this many seconds
        #[arg(long, env = "REAP_PUBLISHING_AFTER_SEC", default_value = "120")]
        reap_publishing_after_secs: u64,

        /// Reap posts stuck in queued after this many seconds
        #[arg(long, env = "REAP_QUEUED_AFTER_SEC", default_value = "300")]
        reap_queued_after_secs: u64,

        /// Warn when DB and process clocks drift by more than this
        #[arg(long, env = "DRIFT_WARN_SEC", default_value = "2")]
        drift_warn_secs: u64,

        /// Maximum posts claimed per tick
        #[arg(long, env = "CLAIM_BATCH_SIZE", default_value = "50")]
        claim_batch_size: i64,
    },

    /// Run the publish worker pool
    Worker {
        /// Postgres connection string
        #[arg(long, env = "DATABASE_URL")]
        database_url: String,

        /// Redis connection string for the dispatch queue
        #[arg(long, env = "REDIS_URL", default_value = "redis://redis:6379/0")]
        redis_url: String,

        /// Dispatch queue name
        #[arg(long, env = "PUBLISH_QUEUE", default_value = "publish")]
        queue: String,

        /// Base URL relative media references resolve against
        #[arg(long, env = "APP_BASE_URL", default_value = "http://localhost:8080")]
        app_base_url: String,

        /// Graph API origin
        #[arg(long, env = "GRAPH_API_URL", default_value = "https://graph.facebook.com")]
        graph_api_url: String,

        /// Graph API version
        #[arg(long, env = "META_GRAPH_VERSION", default_value = "v19.0")]
        graph_version: String,

        /// Lock owner identity; defaults to the container hostname
        #[arg(long, env = "WORKER_ID")]
        worker_id: Option<String>,

        /// Number of parallel workers
        #[arg(long, default_value = "4")]
        workers: usize,

        /// Fabricate publish results instead of calling the platform
        #[arg(long, env = "MOCK_META", value_parser = parse_bool_env, default_value = "true")]
        mock_publish: bool,

        /// Fixed delay before a retry becomes claimable, in seconds
        #[arg(long, env = "RETRY_DELAY_SEC", default_value = "600")]
        retry_delay_secs: u64,

        /// Pause an account after this many consecutive failed posts
        #[arg(long, env = "PAUSE_ON_CONSEC_FAILS", default_value = "3")]
        pause_after_consecutive_failures: usize,
    },

    /// Commit (or preflight) a weekly batch plan for an account
    Batch {
        /// Postgres connection string
        #[arg(long, env = "DATABASE_URL")]
        database_url: String,

        /// Account to schedule for
        #[arg(long)]
        account_id: i64,

        /// First day of the range (YYYY-MM-DD)
        #[arg(long)]
        start_date: chrono::NaiveDate,

        /// Last day of the range, inclusive (YYYY-MM-DD)
        #[arg(long)]
        end_date: chrono::NaiveDate,

        /// Weekly plan as JSON: a 7-element list (Mon..Sun) or a weekday map
        #[arg(long)]
        plan: String,

        /// IANA timezone the plan is expressed in
        #[arg(long, default_value = "UTC")]
        timezone: String,

        /// Batch epoch; resubmitting with the same epoch updates in place
        #[arg(long)]
        epoch: i64,

        /// Media pool, comma-separated, assigned round-robin
        #[arg(long, value_delimiter = ',')]
        media: Vec<String>,

        /// Reject conflicting candidates instead of autoshifting them
        #[arg(long)]
        no_autoshift: bool,

        /// Cancel newest existing bookings when a day is over the limit
        #[arg(long)]
        override_conflicts: bool,

        /// Simulate placement only; no writes
        #[arg(long)]
        preflight: bool,

        /// Directory skip reports are written to
        #[arg(long, env = "MEDIA_ROOT", default_value = "./media")]
        media_root: String,

        /// Base URL report references are addressed under
        #[arg(long, env = "APP_BASE_URL", default_value = "http://localhost:8080")]
        app_base_url: String,
    },

    /// List accounts
    Accounts {
        /// Postgres connection string
        #[arg(long, env = "DATABASE_URL")]
        database_url: String,

        /// Filter on the pause switch
        #[arg(long)]
        active: Option<bool>,
    },

    /// Pause an account and force-fail its scheduled backlog
    Freeze {
        /// Postgres connection string
        #[arg(long, env = "DATABASE_URL")]
        database_url: String,

        /// Account to freeze
        #[arg(long)]
        account_id: i64,
    },

    /// Reactivate a paused account
    Unfreeze {
        /// Postgres connection string
        #[arg(long, env = "DATABASE_URL")]
        database_url: String,

        /// Account to reactivate
        #[arg(long)]
        account_id: i64,
    },

    /// Run database migrations
    Migrate {
        /// Postgres connection string
        #[arg(long, env = "DATABASE_URL")]
        database_url: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "cadence=info".to_string()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Scheduler {
            database_url,
            redis_url,
            queue,
            lookahead_secs,
            tick_secs,
            reap_publishing_after_secs,
            reap_queued_after_secs,
            drift_warn_secs,
            claim_batch_size,
        } => {
            let config = Arc::new(PipelineConfig {
                lookahead_secs,
                tick_secs,
                reap_publishing_after_secs,
                reap_queued_after_secs,
                drift_warn_secs,
                claim_batch_size,
                ..PipelineConfig::default()
            });
            run_scheduler(&database_url, &redis_url, &queue, config).await
        }

        Commands::Worker {
            database_url,
            redis_url,
            queue,
            app_base_url,
            graph_api_url,
            graph_version,
            worker_id,
            workers,
            mock_publish,
            retry_delay_secs,
            pause_after_consecutive_failures,
        } => {
            let config = Arc::new(PipelineConfig {
                retry_delay_secs,
                pause_after_consecutive_failures,
                ..PipelineConfig::default()
            });
            let options = WorkerOptions {
                worker_id: worker_id
                    .or_else(|| std::env::var("HOSTNAME").ok())
                    .unwrap_or_else(|| "worker".to_string()),
                public_base_url: app_base_url,
                mock_publish,
            };
            run_worker_pool(
                &database_url,
                &redis_url,
                &queue,
                &graph_api_url,
                &graph_version,
                workers,
                options,
                config,
            )
            .await
        }

        Commands::Batch {
            database_url,
            account_id,
            start_date,
            end_date,
            plan,
            timezone,
            epoch,
            media,
            no_autoshift,
            override_conflicts,
            preflight,
            media_root,
            app_base_url,
        } => {
            let weekly_plan: WeeklyPlanInput = serde_json::from_str(&plan)
                .map_err(|e| miette::miette!("invalid plan JSON: {e}"))?;

            let mut request =
                BatchRequest::new(account_id, start_date, end_date, weekly_plan, timezone, epoch);
            request.autoshift = !no_autoshift;
            request.override_conflicts = override_conflicts;
            request.media_urls = media;

            let store = PgStore::connect(&database_url, 5)
                .await
                .map_err(|e| miette::miette!("{e}"))?;
            let config = PipelineConfig::default();
            let committer = BatchCommitter::new(&store, &config);

            if preflight {
                let outcome = committer
                    .preflight(&request)
                    .await
                    .map_err(|e| miette::miette!("{e}"))?;
                println!(
                    "{}",
                    serde_json::to_string_pretty(&outcome)
                        .map_err(|e| miette::miette!("{e}"))?
                );
            } else {
                let report_dir = std::path::Path::new(&media_root).join("reports");
                let sink = LocalReportSink::new(
                    report_dir,
                    format!("{}/media/reports", app_base_url.trim_end_matches('/')),
                );
                let outcome = committer
                    .commit(&request, Some(&sink))
                    .await
                    .map_err(|e| miette::miette!("{e}"))?;
                println!(
                    "{}",
                    serde_json::to_string_pretty(&outcome)
                        .map_err(|e| miette::miette!("{e}"))?
                );
            }
            Ok(())
        }

        Commands::Accounts {
            database_url,
            active,
        } => {
            let store = PgStore::connect(&database_url, 2)
                .await
                .map_err(|e| miette::miette!("{e}"))?;
            let accounts = store
                .list_accounts(active)
                .await
                .map_err(|e| miette::miette!("{e}"))?;
            println!(
                "{}",
                serde_json::to_string_pretty(&accounts).map_err(|e| miette::miette!("{e}"))?
            );
            Ok(())
        }

        Commands::Freeze {
            database_url,
            account_id,
        } => {
            let store = PgStore::connect(&database_url, 2)
                .await
                .map_err(|e| miette::miette!("{e}"))?;
            let failed = store
                .freeze_account(account_id)
                .await
                .map_err(|e| miette::miette!("{e}"))?;
            info!(account_id, failed, "account frozen");
            Ok(())
        }

        Commands::Unfreeze {
            database_url,
            account_id,
        } => {
            let store = PgStore::connect(&database_url, 2)
                .await
                .map_err(|e| miette::miette!("{e}"))?;
            store
                .resume_account(account_id)
                .await
                .map_err(|e| miette::miette!("{e}"))?;
            info!(account_id, "account reactivated");
            Ok(())
        }

        Commands::Migrate { database_url } => {
            let store = PgStore::connect(&database_url, 2)
                .await
                .map_err(|e| miette::miette!("{e}"))?;
            store.migrate().await.map_err(|e| miette::miette!("{e}"))?;
            info!("migrations applied");
            Ok(())
        }
    }
}

/// Flip the shutdown switch on ctrl-c.
fn shutdown_on_ctrl_c() -> watch::Receiver<bool> {
    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown requested");
            let _ = tx.send(true);
        }
    });
    rx
}

async fn run_scheduler(
    database_url: &str,
    redis_url: &str,
    queue_name: &str,
    config: Arc<PipelineConfig>,
) -> Result<()> {
    let store = PgStore::connect(database_url, 5)
        .await
        .map_err(|e| miette::miette!("{e}"))?;
    let queue = RedisQueue::connect(redis_url, queue_name)
        .await
        .map_err(|e| miette::miette!("{e}"))?;

    let claimer = Claimer::new(store, queue, config);
    claimer.run(shutdown_on_ctrl_c()).await;
    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn run_worker_pool(
    database_url: &str,
    redis_url: &str,
    queue_name: &str,
    graph_api_url: &str,
    graph_version: &str,
    workers: usize,
    options: WorkerOptions,
    config: Arc<PipelineConfig>,
) -> Result<()> {
    let store = PgStore::connect(database_url, 10)
        .await
        .map_err(|e| miette::miette!("{e}"))?;
    let queue = RedisQueue::connect(redis_url, queue_name)
        .await
        .map_err(|e| miette::miette!("{e}"))?;
    let graph = GraphClient::new(graph_api_url, graph_version);

    let publisher = Arc::new(Publisher::new(store, graph, config, options));
    run_workers(publisher, queue, workers, shutdown_on_ctrl_c()).await;
    Ok(())
}
