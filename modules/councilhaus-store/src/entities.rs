//! PgEntityStore: derived entities as JSONB rows.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{PgExecutor, PgPool};
use tracing::debug;

use councilhaus_common::{Entity, EntityKey, EntityKind};
use councilhaus_engine::EntityStore;

#[derive(Clone)]
pub struct PgEntityStore {
    pool: PgPool,
}

impl PgEntityStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Number of stored records of one kind.
    pub async fn count(&self, kind: EntityKind) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM entities WHERE kind = $1")
            .bind(kind.as_str())
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

async fn upsert<'e>(executor: impl PgExecutor<'e>, entity: &Entity) -> Result<()> {
    let data = serde_json::to_value(entity)
        .with_context(|| format!("failed to serialize {} {}", entity.kind(), entity.key()))?;

    sqlx::query(
        r#"
        INSERT INTO entities (kind, id, data)
        VALUES ($1, $2, $3)
        ON CONFLICT (kind, id) DO UPDATE
            SET data = EXCLUDED.data, updated_at = now()
        "#,
    )
    .bind(entity.kind().as_str())
    .bind(entity.key().canonical())
    .bind(data)
    .execute(executor)
    .await?;

    Ok(())
}

#[async_trait]
impl EntityStore for PgEntityStore {
    async fn load(&self, kind: EntityKind, key: &EntityKey) -> Result<Option<Entity>> {
        let data = sqlx::query_scalar::<_, serde_json::Value>(
            "SELECT data FROM entities WHERE kind = $1 AND id = $2",
        )
        .bind(kind.as_str())
        .bind(key.canonical())
        .fetch_optional(&self.pool)
        .await?;

        data.map(|d| {
            serde_json::from_value::<Entity>(d)
                .with_context(|| format!("corrupt {kind} record {key}"))
        })
        .transpose()
    }

    async fn save(&self, entity: Entity) -> Result<()> {
        upsert(&self.pool, &entity).await
    }

    async fn remove(&self, kind: EntityKind, key: &EntityKey) -> Result<bool> {
        let result = sqlx::query("DELETE FROM entities WHERE kind = $1 AND id = $2")
            .bind(kind.as_str())
            .bind(key.canonical())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// One transaction: either every record lands or none does.
    async fn save_all(&self, entities: Vec<Entity>) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for entity in &entities {
            upsert(&mut *tx, entity).await?;
        }
        tx.commit().await?;
        debug!(count = entities.len(), "Entity batch committed");
        Ok(())
    }
}
