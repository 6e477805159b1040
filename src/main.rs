//! Operator tool: inspect, flush or refresh a judge's pending scores from the command line.

use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use scoring_sync::{
    config::SyncConfig,
    dao::{
        dirty_queue::DirtyQueue,
        models::PersonId,
        queue_store::{
            QueueStore,
            file::{FileQueueStore, FileStoreConfig},
        },
        storage::StorageError,
    },
    services::{data_manager::DataManager, scoring_api::HttpScoringApi},
    state::{ConnectivityTracker, EventHub, VersionMarker},
};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Operator command line arguments.
#[derive(Parser, Debug)]
#[command(name = "scoring-sync")]
#[command(about = "Inspect, flush or refresh a judge's pending scores")]
struct Args {
    /// Judge whose queue is inspected
    judge: PersonId,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    /// Print the pending scores (default)
    Status,
    /// Upload the pending scores in one batch
    Flush,
    /// Fetch the heat list and print its version
    Fetch,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing();

    let judge = args.judge;
    let config = SyncConfig::load();

    let events = Arc::new(EventHub::new(config.event_capacity));
    let store_config = FileStoreConfig::new(config.queue_dir.clone());
    let queue = DirtyQueue::new(
        move || {
            let store_config = store_config.clone();
            async move {
                let store = FileQueueStore::connect(store_config)
                    .await
                    .map_err(StorageError::from)?;
                Ok(Arc::new(store) as Arc<dyn QueueStore>)
            }
        },
        events.clone(),
    );
    let api = HttpScoringApi::new(&config.base_url, config.request_timeout())
        .context("building scoring client")?;
    let tracker = Arc::new(ConnectivityTracker::new(config.assume_online, events.clone()));
    let manager = DataManager::new(
        Arc::new(api),
        queue,
        tracker,
        events,
        config.batch_clear_policy,
    );

    match args.command.unwrap_or(Command::Status) {
        Command::Status => {
            let pending = manager
                .pending_scores(judge)
                .await
                .context("reading pending scores")?;
            println!("judge {judge}: {} pending score(s)", pending.len());
            for score in pending {
                println!(
                    "  heat {} slot {}: score={:?} comments={:?} good={:?} bad={:?}",
                    score.heat,
                    score.dedup_key().slot,
                    score.score,
                    score.comments,
                    score.good,
                    score.bad
                );
            }
        }
        Command::Flush => {
            let outcome = manager
                .sync_now(judge)
                .await
                .context("uploading pending scores")?;
            info!(
                judge,
                confirmed = outcome.confirmed,
                failed = outcome.failed.len(),
                "flush finished"
            );
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
        Command::Fetch => {
            let payload = manager
                .fetch_heats(judge, true)
                .await
                .context("fetching heats")?;
            let marker = VersionMarker::from_payload(&payload);
            println!(
                "judge {judge}: {} heat(s), last updated {}",
                marker.heat_count,
                marker
                    .max_updated_at
                    .map(|at| at.to_string())
                    .unwrap_or_else(|| "never".into())
            );
        }
    }

    Ok(())
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,scoring_sync=debug".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
