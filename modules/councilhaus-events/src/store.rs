//! LogStore: append-only log table backed by Postgres.
//!
//! Rows are keyed by their chain position, so appending the same log twice is a
//! no-op and a replay after a crawler restart cannot duplicate anything.

use anyhow::Result;
use sqlx::PgPool;
use tracing::debug;

use councilhaus_common::{LogEvent, LogPosition};

use crate::types::{position_columns, StoredLog};

// ---------------------------------------------------------------------------
// LogStore
// ---------------------------------------------------------------------------

/// Decoded contract logs in chain order. The indexer's source of truth.
#[derive(Clone)]
pub struct LogStore {
    pool: PgPool,
}

impl LogStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Append a decoded log. Returns `false` when the position was already stored.
    pub async fn append(&self, log: &LogEvent) -> Result<bool> {
        let (block_number, transaction_index, log_index) = position_columns(&log.meta.position)?;
        let payload = log.event.to_payload()?;

        let result = sqlx::query(
            r#"
            INSERT INTO council_logs
                (block_number, transaction_index, log_index, transaction_hash, source,
                 block_timestamp, event_type, payload)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (block_number, transaction_index, log_index) DO NOTHING
            "#,
        )
        .bind(block_number)
        .bind(transaction_index)
        .bind(log_index)
        .bind(log.meta.transaction_hash.to_string())
        .bind(log.meta.source.to_string())
        .bind(log.meta.block_timestamp)
        .bind(log.event.event_type())
        .bind(payload)
        .execute(&self.pool)
        .await?;

        let inserted = result.rows_affected() == 1;
        if !inserted {
            debug!(position = %log.meta.position, "Log already stored, skipping append");
        }
        Ok(inserted)
    }

    /// Read raw rows at or after `from`, in chain order.
    pub async fn read_rows_from(&self, from: &LogPosition, limit: usize) -> Result<Vec<StoredLog>> {
        let (block_number, transaction_index, log_index) = position_columns(from)?;

        let rows = sqlx::query_as::<_, StoredLog>(
            r#"
            SELECT block_number, transaction_index, log_index, transaction_hash, source,
                   block_timestamp, event_type, payload
            FROM council_logs
            WHERE (block_number, transaction_index, log_index) >= ($1, $2, $3)
            ORDER BY block_number ASC, transaction_index ASC, log_index ASC
            LIMIT $4
            "#,
        )
        .bind(block_number)
        .bind(transaction_index)
        .bind(log_index)
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Read decoded logs at or after `from`, in chain order.
    pub async fn read_from(&self, from: &LogPosition, limit: usize) -> Result<Vec<LogEvent>> {
        self.read_rows_from(from, limit)
            .await?
            .iter()
            .map(StoredLog::decode)
            .collect()
    }

    /// Highest stored position, if any.
    pub async fn latest_position(&self) -> Result<Option<LogPosition>> {
        let row = sqlx::query_as::<_, StoredLog>(
            r#"
            SELECT block_number, transaction_index, log_index, transaction_hash, source,
                   block_timestamp, event_type, payload
            FROM council_logs
            ORDER BY block_number DESC, transaction_index DESC, log_index DESC
            LIMIT 1
            "#,
        )
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| r.position()).transpose()
    }
}
