//! Row types for the log table.

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};

use councilhaus_common::{Address, CouncilEvent, EventMeta, LogEvent, LogPosition, B256};

/// A log as stored in Postgres. Returned by all read methods.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StoredLog {
    pub block_number: i64,
    pub transaction_index: i32,
    pub log_index: i32,
    pub transaction_hash: String,
    pub source: String,
    pub block_timestamp: DateTime<Utc>,
    pub event_type: String,
    pub payload: serde_json::Value,
}

impl StoredLog {
    pub fn position(&self) -> Result<LogPosition> {
        Ok(LogPosition::new(
            u64::try_from(self.block_number)
                .map_err(|_| anyhow!("negative block number {}", self.block_number))?,
            u32::try_from(self.transaction_index)
                .map_err(|_| anyhow!("negative transaction index {}", self.transaction_index))?,
            u32::try_from(self.log_index)
                .map_err(|_| anyhow!("negative log index {}", self.log_index))?,
        ))
    }

    /// Decode back into the event the crawler appended.
    pub fn decode(&self) -> Result<LogEvent> {
        let position = self.position()?;
        let source: Address = self
            .source
            .parse()
            .with_context(|| format!("bad source address at {position}"))?;
        let transaction_hash: B256 = self
            .transaction_hash
            .parse()
            .with_context(|| format!("bad transaction hash at {position}"))?;
        let event = CouncilEvent::from_payload(&self.payload).with_context(|| {
            format!("undecodable {} payload at {position}", self.event_type)
        })?;

        Ok(LogEvent::new(
            EventMeta {
                source,
                position,
                block_timestamp: self.block_timestamp,
                transaction_hash,
            },
            event,
        ))
    }
}

/// Convert a position to the signed column types Postgres uses.
pub fn position_columns(position: &LogPosition) -> Result<(i64, i32, i32)> {
    Ok((
        i64::try_from(position.block_number)
            .map_err(|_| anyhow!("block number {} out of range", position.block_number))?,
        i32::try_from(position.transaction_index).map_err(|_| {
            anyhow!("transaction index {} out of range", position.transaction_index)
        })?,
        i32::try_from(position.log_index)
            .map_err(|_| anyhow!("log index {} out of range", position.log_index))?,
    ))
}
