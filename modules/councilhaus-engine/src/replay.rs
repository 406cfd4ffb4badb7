//! Replay and follow the feed.
//!
//! Replaying already-processed events is safe: every write is an idempotent
//! upsert and every delete of an absent record is a no-op. That is what makes
//! "restart from the last checkpoint" and "replay from block N" correct.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{ensure, Result};
use tracing::{debug, info};

use councilhaus_common::LogPosition;

use crate::indexer::Indexer;
use crate::outcome::IndexStats;
use crate::traits::{CheckpointStore, EventFeed};

/// Apply every event at or after `from` until the feed is exhausted.
pub async fn replay_from(
    indexer: &Indexer,
    feed: &dyn EventFeed,
    from: LogPosition,
    batch_size: usize,
) -> Result<IndexStats> {
    replay_with(indexer, feed, from, batch_size, None, |_| async { Ok(()) }).await
}

/// Like [`replay_from`], calling `after_batch` with the last position of each
/// fully applied batch. When `stop` is set the loop ends after the current
/// batch; a batch is never abandoned half way.
async fn replay_with<F, Fut>(
    indexer: &Indexer,
    feed: &dyn EventFeed,
    from: LogPosition,
    batch_size: usize,
    stop: Option<&AtomicBool>,
    mut after_batch: F,
) -> Result<IndexStats>
where
    F: FnMut(LogPosition) -> Fut,
    Fut: std::future::Future<Output = Result<()>>,
{
    ensure!(batch_size > 0, "batch size must be positive");

    let mut cursor = from;
    let mut total = IndexStats::default();

    loop {
        let events = feed.read_from(&cursor, batch_size).await?;
        let Some(last) = events.last().map(|e| e.meta.position) else {
            break;
        };

        let stats = indexer.apply_batch(&events).await?;
        debug!(
            applied = stats.applied,
            noop = stats.noop,
            skipped = stats.skipped,
            last = %last,
            "Batch applied"
        );
        total.merge(stats);
        after_batch(last).await?;

        cursor = last.next();
        if events.len() < batch_size {
            break;
        }
        if stop.is_some_and(|s| s.load(Ordering::SeqCst)) {
            info!(last = %last, "Stop requested, ending after batch");
            break;
        }
    }

    Ok(total)
}

/// Follows the feed from a persisted checkpoint.
pub struct Follower {
    indexer: Indexer,
    feed: Arc<dyn EventFeed>,
    checkpoints: Arc<dyn CheckpointStore>,
    name: String,
    start_block: u64,
    batch_size: usize,
    shutdown: Arc<AtomicBool>,
}

impl Follower {
    pub fn new(
        indexer: Indexer,
        feed: Arc<dyn EventFeed>,
        checkpoints: Arc<dyn CheckpointStore>,
        name: impl Into<String>,
        start_block: u64,
        batch_size: usize,
    ) -> Self {
        Self {
            indexer,
            feed,
            checkpoints,
            name: name.into(),
            start_block,
            batch_size,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Share a shutdown flag. Once set, runs end at the next batch boundary.
    pub fn with_shutdown(mut self, shutdown: Arc<AtomicBool>) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn shutdown_requested(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    /// Where the next run starts: just after the checkpoint, or the configured
    /// start block when there is none.
    pub async fn resume_position(&self) -> Result<LogPosition> {
        Ok(match self.checkpoints.load_checkpoint(&self.name).await? {
            Some(last) => last.next(),
            None => LogPosition::start_of_block(self.start_block),
        })
    }

    /// Process everything available past the checkpoint.
    pub async fn poll_once(&self) -> Result<IndexStats> {
        let from = self.resume_position().await?;
        self.run_from(from).await
    }

    /// Re-apply everything from `block_number` onward, ignoring the checkpoint.
    pub async fn replay_from_block(&self, block_number: u64) -> Result<IndexStats> {
        info!(follower = self.name.as_str(), block_number, "Replay starting");
        let stats = self.run_from(LogPosition::start_of_block(block_number)).await?;
        info!(
            follower = self.name.as_str(),
            applied = stats.applied,
            noop = stats.noop,
            skipped = stats.skipped,
            "Replay complete"
        );
        Ok(stats)
    }

    async fn run_from(&self, from: LogPosition) -> Result<IndexStats> {
        let checkpoints = self.checkpoints.as_ref();
        let name = self.name.as_str();

        replay_with(
            &self.indexer,
            self.feed.as_ref(),
            from,
            self.batch_size,
            Some(self.shutdown.as_ref()),
            |last| async move { checkpoints.save_checkpoint(name, &last).await },
        )
        .await
    }
}
