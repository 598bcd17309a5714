mod summary;

use anyhow::Context;
use clap::{Parser, Subcommand};
use common::StagedImageStatus;
use stagehand_server::config::AppConfig;
use stagehand_server::database::init_db;
use stagehand_server::reconcile::ReconcileOptions;
use stagehand_server::state::AppState;
use stagehand_server::storage::build_object_store;
use stagehand_server::utils::time::hours;
use tokio_util::sync::CancellationToken;
use tracing::warn;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "stagehand", version, about = "Stagehand image storage maintenance")]
struct Cli {
    /// Also print a machine-readable JSON summary.
    #[arg(
        long = "json",
        env = "STAGEHAND_JSON_SUMMARY",
        global = true,
        value_parser = clap::builder::FalseyValueParser::new()
    )]
    json_summary: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Compare staged-image metadata with the object store and repair drift
    Reconcile {
        /// Rows fetched per page [default: reconcile.batch_size]
        #[arg(long)]
        batch_size: Option<u64>,
        /// Concurrent storage checks per page [default: reconcile.concurrency]
        #[arg(long)]
        concurrency: Option<usize>,
        /// Report drift without modifying any row
        #[arg(long)]
        dry_run: bool,
        /// Only check images of this project
        #[arg(long)]
        project: Option<i32>,
        /// Only check images in this status (queued, processing, ready, error)
        #[arg(long)]
        status: Option<StagedImageStatus>,
    },
    /// Delete staged images stuck in `queued`
    CleanupStuck {
        /// Minimum age in hours [default: gc.stuck_queued_hours]
        #[arg(long)]
        older_than_hours: Option<u64>,
    },
    /// Delete unreferenced originals past the grace period
    CleanupOrphans {
        /// Grace period in hours [default: gc.orphan_grace_period_secs]
        #[arg(long)]
        grace_hours: Option<u64>,
        /// Maximum originals to delete [default: gc.orphan_batch_limit]
        #[arg(long)]
        limit: Option<u64>,
    },
    /// Print original storage statistics
    Stats,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = AppConfig::load().context("Failed to load configuration")?;
    let db = init_db(&config.database)
        .await
        .context("Failed to connect to database")?;
    let store = build_object_store(&config.storage)
        .await
        .context("Failed to initialise object store")?;
    let state = AppState::new(config, db, store);

    match cli.command {
        Command::Reconcile {
            batch_size,
            concurrency,
            dry_run,
            project,
            status,
        } => {
            let defaults = &state.config.reconcile;
            let options = ReconcileOptions {
                limit: batch_size.unwrap_or(defaults.batch_size).max(1),
                concurrency: concurrency.unwrap_or(defaults.concurrency).max(1),
                dry_run,
                project_filter: project,
                status_filter: status,
            };

            let cancel = CancellationToken::new();
            tokio::spawn(cancel_on_ctrl_c(cancel.clone()));

            let result = state
                .reconcile
                .reconcile_images(&options, &cancel)
                .await
                .context("Reconciliation aborted")?;

            print!("{}", summary::reconcile(&result));
            if cli.json_summary {
                println!("{}", serde_json::to_string_pretty(&result)?);
            }
        }
        Command::CleanupStuck { older_than_hours } => {
            let hours_threshold = older_than_hours.unwrap_or(state.config.gc.stuck_queued_hours);
            let result = state
                .reconcile
                .cleanup_stuck_queued_images(hours(hours_threshold))
                .await
                .context("Stuck image cleanup failed")?;

            print!("{}", summary::stuck_cleanup(&result, hours_threshold));
            if cli.json_summary {
                println!("{}", serde_json::to_string_pretty(&result)?);
            }
        }
        Command::CleanupOrphans { grace_hours, limit } => {
            let gc = &state.config.gc;
            let grace = grace_hours
                .map(hours)
                .unwrap_or_else(|| gc.orphan_grace_period());
            let limit = limit.unwrap_or(gc.orphan_batch_limit).max(1);

            let deleted = state
                .originals
                .cleanup_orphaned(grace, limit)
                .await
                .context("Orphan cleanup failed")?;

            print!("{}", summary::orphan_cleanup(deleted, grace));
            if cli.json_summary {
                println!(
                    "{}",
                    serde_json::json!({ "deleted": deleted, "grace_period_secs": grace.as_secs() })
                );
            }
        }
        Command::Stats => {
            let stats = state
                .originals
                .get_stats()
                .await
                .context("Failed to read statistics")?;

            print!("{}", summary::stats(&stats));
            if cli.json_summary {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            }
        }
    }

    Ok(())
}

async fn cancel_on_ctrl_c(cancel: CancellationToken) {
    if tokio::signal::ctrl_c().await.is_ok() {
        warn!("Interrupted, finishing in-flight checks");
        cancel.cancel();
    }
}
