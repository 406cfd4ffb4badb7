//! PgSourceRegistry: council instances whose logs the indexer routes.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::PgPool;

use councilhaus_common::Address;
use councilhaus_engine::SourceRegistry;

#[derive(Clone)]
pub struct PgSourceRegistry {
    pool: PgPool,
}

impl PgSourceRegistry {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Every registered instance, ordered by address.
    pub async fn instances(&self) -> Result<Vec<Address>> {
        let rows = sqlx::query_scalar::<_, String>(
            "SELECT address FROM council_instances ORDER BY address",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|a| {
                a.parse::<Address>()
                    .with_context(|| format!("bad instance address {a}"))
            })
            .collect()
    }
}

#[async_trait]
impl SourceRegistry for PgSourceRegistry {
    async fn register_instance(&self, address: &Address) -> Result<()> {
        sqlx::query(
            "INSERT INTO council_instances (address) VALUES ($1) ON CONFLICT (address) DO NOTHING",
        )
        .bind(address.to_string())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn is_registered(&self, address: &Address) -> Result<bool> {
        let found = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM council_instances WHERE address = $1)",
        )
        .bind(address.to_string())
        .fetch_one(&self.pool)
        .await?;
        Ok(found)
    }
}
