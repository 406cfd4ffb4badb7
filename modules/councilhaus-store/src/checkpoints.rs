//! PgCheckpoints: last fully applied position per follower.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use sqlx::PgPool;

use councilhaus_common::LogPosition;
use councilhaus_engine::CheckpointStore;
use councilhaus_events::position_columns;

#[derive(Clone)]
pub struct PgCheckpoints {
    pool: PgPool,
}

impl PgCheckpoints {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CheckpointStore for PgCheckpoints {
    async fn load_checkpoint(&self, name: &str) -> Result<Option<LogPosition>> {
        let row = sqlx::query_as::<_, (i64, i32, i32)>(
            "SELECT block_number, transaction_index, log_index FROM checkpoints WHERE name = $1",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|(block, tx, log)| {
            Ok(LogPosition::new(
                u64::try_from(block).map_err(|_| anyhow!("negative checkpoint block {block}"))?,
                u32::try_from(tx).map_err(|_| anyhow!("negative checkpoint transaction {tx}"))?,
                u32::try_from(log).map_err(|_| anyhow!("negative checkpoint log {log}"))?,
            ))
        })
        .transpose()
    }

    async fn save_checkpoint(&self, name: &str, position: &LogPosition) -> Result<()> {
        let (block_number, transaction_index, log_index) = position_columns(position)?;

        sqlx::query(
            r#"
            INSERT INTO checkpoints (name, block_number, transaction_index, log_index)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (name) DO UPDATE
                SET block_number = EXCLUDED.block_number,
                    transaction_index = EXCLUDED.transaction_index,
                    log_index = EXCLUDED.log_index,
                    updated_at = now()
            "#,
        )
        .bind(name)
        .bind(block_number)
        .bind(transaction_index)
        .bind(log_index)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
