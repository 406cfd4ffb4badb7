use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use sqlx::postgres::PgPoolOptions;
use tokio::sync::Notify;
use tracing::{error, info, warn, Instrument};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use councilhaus_common::{Config, IndexerError};
use councilhaus_engine::{Follower, IndexStats, Indexer, IndexerDeps};
use councilhaus_events::LogStore;
use councilhaus_rpc::RpcClient;
use councilhaus_store::{migrate, PgCheckpoints, PgEntityStore, PgSourceRegistry};

#[derive(Parser)]
#[command(name = "councilhaus-indexer", about = "Council governance event indexer")]
struct Cli {
    /// Re-apply every stored log from this block onward, then exit.
    #[arg(long)]
    from_block: Option<u64>,

    /// Process what is available once and exit instead of following.
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("councilhaus=info".parse()?))
        .init();

    let cli = Cli::parse();
    let run_id = Uuid::new_v4();

    run(cli)
        .instrument(tracing::info_span!("indexer", %run_id))
        .await
}

async fn run(cli: Cli) -> Result<()> {
    info!("Council indexer starting...");

    let config = Config::from_env()?;
    config.log_redacted();

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await?;
    migrate(&pool).await?;

    // Ctrl-C only raises a flag; the follower stops at the next batch boundary.
    let shutdown = Arc::new(AtomicBool::new(false));
    let wake = Arc::new(Notify::new());
    tokio::spawn({
        let shutdown = shutdown.clone();
        let wake = wake.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Shutdown requested, stopping after the current batch");
                shutdown.store(true, Ordering::SeqCst);
                wake.notify_one();
            }
        }
    });

    let rpc = Arc::new(RpcClient::new(&config.rpc_url)?);
    let logs = Arc::new(LogStore::new(pool.clone()));

    let indexer = Indexer::new(
        IndexerDeps::builder()
            .store(Arc::new(PgEntityStore::new(pool.clone())))
            .registry(Arc::new(PgSourceRegistry::new(pool.clone())))
            .reader(rpc.clone())
            .factories(config.factory_addresses.clone())
            .build(),
    );
    let follower = Follower::new(
        indexer,
        logs.clone(),
        Arc::new(PgCheckpoints::new(pool)),
        config.checkpoint_name.clone(),
        config.start_block,
        config.batch_size,
    )
    .with_shutdown(shutdown.clone());

    if let Some(block) = cli.from_block {
        follower.replay_from_block(block).await.map_err(halt)?;
        return Ok(());
    }

    let interval = Duration::from_secs(config.poll_interval_secs);
    loop {
        let stats = follower.poll_once().await.map_err(halt)?;
        if stats.total() > 0 {
            report(&stats, &logs, &rpc).await;
        }
        if cli.once || follower.shutdown_requested() {
            break;
        }

        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = wake.notified() => {}
        }
        if follower.shutdown_requested() {
            break;
        }
    }

    info!("Council indexer stopped");
    Ok(())
}

/// Log a failed run before it propagates out of `main`.
fn halt(err: anyhow::Error) -> anyhow::Error {
    match err.downcast_ref::<IndexerError>() {
        Some(IndexerError::UpstreamInconsistency { .. }) => {
            error!(error = %err, "Upstream inconsistency, halting at the failing event")
        }
        _ => error!(error = %format!("{err:#}"), "Indexing failed, halting"),
    }
    err
}

async fn report(stats: &IndexStats, logs: &LogStore, rpc: &RpcClient) {
    let processed = stats.last_position.map(|p| p.block_number);
    let stored = match logs.latest_position().await {
        Ok(p) => p.map(|p| p.block_number),
        Err(e) => {
            warn!(error = %e, "Failed to read latest stored log");
            None
        }
    };
    let head = match rpc.chain_head().await {
        Ok(head) => Some(head),
        Err(e) => {
            warn!(error = %e, "Failed to read chain head");
            None
        }
    };

    info!(
        applied = stats.applied,
        noop = stats.noop,
        skipped = stats.skipped,
        processed_block = ?processed,
        stored_block = ?stored,
        chain_head = ?head,
        lag_blocks = ?head.zip(processed).map(|(h, p)| h.saturating_sub(p)),
        "Poll complete"
    );
}
