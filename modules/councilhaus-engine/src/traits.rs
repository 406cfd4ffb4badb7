//! Seams between the indexing engine and its collaborators.
//!
//! Production implementations live in `councilhaus-store` (Postgres) and
//! `councilhaus-rpc` (chain queries); `crate::memory` has in-process ones for tests.

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use councilhaus_common::{
    Address, Amount, Entity, EntityKey, EntityKind, EntityRecord, LogEvent, LogPosition,
};

/// Keyed record store. No relational constraints; the engine enforces those.
///
/// A read that follows a write in the same handler must observe it.
#[async_trait]
pub trait EntityStore: Send + Sync {
    async fn load(&self, kind: EntityKind, key: &EntityKey) -> Result<Option<Entity>>;

    /// Upsert by `(kind, key)`.
    async fn save(&self, entity: Entity) -> Result<()>;

    /// Idempotent delete. Returns whether a record was actually removed.
    async fn remove(&self, kind: EntityKind, key: &EntityKey) -> Result<bool>;

    /// Upsert several records. Implementations with transactions should make
    /// this all-or-nothing.
    async fn save_all(&self, entities: Vec<Entity>) -> Result<()> {
        for entity in entities {
            self.save(entity).await?;
        }
        Ok(())
    }
}

/// Load a record as its concrete type.
pub async fn load_as<T: EntityRecord>(
    store: &dyn EntityStore,
    key: &EntityKey,
) -> Result<Option<T>> {
    match store.load(T::KIND, key).await? {
        None => Ok(None),
        Some(entity) => {
            let found = entity.kind();
            T::from_entity(entity)
                .map(Some)
                .ok_or_else(|| anyhow!("record {key} stored as {} holds a {found}", T::KIND))
        }
    }
}

/// Instance addresses whose events are routed to the council handler.
#[async_trait]
pub trait SourceRegistry: Send + Sync {
    /// Idempotent.
    async fn register_instance(&self, address: &Address) -> Result<()>;

    async fn is_registered(&self, address: &Address) -> Result<bool>;
}

/// Values read from a council instance's contract state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceState {
    pub distribution_token: Address,
    pub max_allocations_per_member: Amount,
}

/// Synchronous query against a newly deployed instance, pinned to a block.
#[async_trait]
pub trait InstanceReader: Send + Sync {
    async fn read_instance(&self, instance: &Address, block_number: u64) -> Result<InstanceState>;
}

/// Ordered source of decoded logs.
#[async_trait]
pub trait EventFeed: Send + Sync {
    /// Logs at or after `from`, in (block, transaction, log) order.
    async fn read_from(&self, from: &LogPosition, limit: usize) -> Result<Vec<LogEvent>>;
}

/// Remembers the last fully processed position per named follower.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    async fn load_checkpoint(&self, name: &str) -> Result<Option<LogPosition>>;

    async fn save_checkpoint(&self, name: &str, position: &LogPosition) -> Result<()>;
}
