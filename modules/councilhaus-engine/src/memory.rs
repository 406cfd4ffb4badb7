//! In-memory implementations of every engine seam.
//!
//! Used by tests and local tooling: no database, no chain. Each type is
//! thread-safe so an `Arc` can be shared with the indexer and inspected after.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;

use councilhaus_common::{Address, Entity, EntityKey, EntityKind, EntityRecord, LogEvent, LogPosition};

use crate::traits::{
    CheckpointStore, EntityStore, EventFeed, InstanceReader, InstanceState, SourceRegistry,
};

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>> {
    mutex.lock().map_err(|_| anyhow!("in-memory state lock poisoned"))
}

// ---------------------------------------------------------------------------
// MemoryEntityStore
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryEntityStore {
    records: Mutex<HashMap<(EntityKind, EntityKey), Entity>>,
}

impl MemoryEntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every record of one kind, ordered by key.
    pub fn all(&self, kind: EntityKind) -> Vec<Entity> {
        let records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        let mut out: Vec<Entity> = records
            .iter()
            .filter(|((k, _), _)| *k == kind)
            .map(|(_, e)| e.clone())
            .collect();
        out.sort_by(|a, b| a.key().cmp(b.key()));
        out
    }

    /// Every record of one concrete type, ordered by key.
    pub fn all_of<T: EntityRecord>(&self) -> Vec<T> {
        self.all(T::KIND)
            .into_iter()
            .filter_map(T::from_entity)
            .collect()
    }

    pub fn get<T: EntityRecord>(&self, key: &EntityKey) -> Option<T> {
        let records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        records
            .get(&(T::KIND, key.clone()))
            .cloned()
            .and_then(T::from_entity)
    }

    pub fn count(&self, kind: EntityKind) -> usize {
        let records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        records.keys().filter(|(k, _)| *k == kind).count()
    }

    pub fn len(&self) -> usize {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl EntityStore for MemoryEntityStore {
    async fn load(&self, kind: EntityKind, key: &EntityKey) -> Result<Option<Entity>> {
        Ok(lock(&self.records)?.get(&(kind, key.clone())).cloned())
    }

    async fn save(&self, entity: Entity) -> Result<()> {
        lock(&self.records)?.insert((entity.kind(), entity.key().clone()), entity);
        Ok(())
    }

    async fn remove(&self, kind: EntityKind, key: &EntityKey) -> Result<bool> {
        Ok(lock(&self.records)?.remove(&(kind, key.clone())).is_some())
    }

    /// Inserted under one lock, so readers never see half a batch.
    async fn save_all(&self, entities: Vec<Entity>) -> Result<()> {
        let mut records = lock(&self.records)?;
        for entity in entities {
            records.insert((entity.kind(), entity.key().clone()), entity);
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MemoryRegistry
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryRegistry {
    instances: Mutex<BTreeSet<Address>>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn instances(&self) -> Vec<Address> {
        self.instances
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .copied()
            .collect()
    }
}

#[async_trait]
impl SourceRegistry for MemoryRegistry {
    async fn register_instance(&self, address: &Address) -> Result<()> {
        lock(&self.instances)?.insert(*address);
        Ok(())
    }

    async fn is_registered(&self, address: &Address) -> Result<bool> {
        Ok(lock(&self.instances)?.contains(address))
    }
}

// ---------------------------------------------------------------------------
// MemoryCheckpoints
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryCheckpoints {
    positions: Mutex<HashMap<String, LogPosition>>,
}

impl MemoryCheckpoints {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CheckpointStore for MemoryCheckpoints {
    async fn load_checkpoint(&self, name: &str) -> Result<Option<LogPosition>> {
        Ok(lock(&self.positions)?.get(name).copied())
    }

    async fn save_checkpoint(&self, name: &str, position: &LogPosition) -> Result<()> {
        lock(&self.positions)?.insert(name.to_string(), *position);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MemoryFeed
// ---------------------------------------------------------------------------

/// Feed over a vector of logs, kept sorted by position.
#[derive(Default)]
pub struct MemoryFeed {
    logs: Mutex<Vec<LogEvent>>,
}

impl MemoryFeed {
    pub fn new(logs: impl IntoIterator<Item = LogEvent>) -> Self {
        let feed = Self::default();
        for log in logs {
            feed.push(log);
        }
        feed
    }

    /// Insert a log at its position. A log already at that position is replaced.
    pub fn push(&self, log: LogEvent) {
        let mut logs = self.logs.lock().unwrap_or_else(PoisonError::into_inner);
        match logs.binary_search_by(|l| l.meta.position.cmp(&log.meta.position)) {
            Ok(i) => logs[i] = log,
            Err(i) => logs.insert(i, log),
        }
    }
}

#[async_trait]
impl EventFeed for MemoryFeed {
    async fn read_from(&self, from: &LogPosition, limit: usize) -> Result<Vec<LogEvent>> {
        Ok(lock(&self.logs)?
            .iter()
            .filter(|l| l.meta.position >= *from)
            .take(limit)
            .cloned()
            .collect())
    }
}

// ---------------------------------------------------------------------------
// StaticInstanceReader
// ---------------------------------------------------------------------------

/// Answers instance queries from a fixed table. Unknown instances fail, which
/// the factory handler treats as an upstream inconsistency.
#[derive(Default)]
pub struct StaticInstanceReader {
    states: HashMap<Address, InstanceState>,
}

impl StaticInstanceReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_instance(mut self, instance: Address, state: InstanceState) -> Self {
        self.states.insert(instance, state);
        self
    }
}

#[async_trait]
impl InstanceReader for StaticInstanceReader {
    async fn read_instance(&self, instance: &Address, block_number: u64) -> Result<InstanceState> {
        match self.states.get(instance) {
            Some(state) => Ok(state.clone()),
            None => bail!("execution reverted: no contract at {instance} (block {block_number})"),
        }
    }
}
