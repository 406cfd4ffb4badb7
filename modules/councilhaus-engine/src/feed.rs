//! EventFeed implementations backed by other crates.

use anyhow::Result;
use async_trait::async_trait;

use councilhaus_common::{LogEvent, LogPosition};
use councilhaus_events::LogStore;

use crate::traits::EventFeed;

// ---------------------------------------------------------------------------
// LogStore adapter (postgres)
// ---------------------------------------------------------------------------

#[async_trait]
impl EventFeed for LogStore {
    async fn read_from(&self, from: &LogPosition, limit: usize) -> Result<Vec<LogEvent>> {
        LogStore::read_from(self, from, limit).await
    }
}
