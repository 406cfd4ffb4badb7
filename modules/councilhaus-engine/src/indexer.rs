//! Dispatch: route each event to the factory or council handler.

use std::sync::Arc;

use anyhow::Result;
use tracing::debug;
use typed_builder::TypedBuilder;

use councilhaus_common::{Address, CouncilEvent, LogEvent};

use crate::handlers::{CouncilHandler, FactoryHandler};
use crate::outcome::{ApplyResult, IndexStats};
use crate::traits::{EntityStore, InstanceReader, SourceRegistry};

/// Long-lived collaborators shared by every handler invocation.
#[derive(Clone, TypedBuilder)]
pub struct IndexerDeps {
    pub store: Arc<dyn EntityStore>,
    pub registry: Arc<dyn SourceRegistry>,
    pub reader: Arc<dyn InstanceReader>,
    /// Factory contracts whose `CouncilCreated` events are trusted.
    pub factories: Vec<Address>,
}

/// Applies decoded logs to the entity store, one at a time, in feed order.
#[derive(Clone)]
pub struct Indexer {
    deps: IndexerDeps,
}

impl Indexer {
    pub fn new(deps: IndexerDeps) -> Self {
        Self { deps }
    }

    /// Apply a single event.
    ///
    /// Skips are reported through [`ApplyResult::Skipped`]. An `Err` means the
    /// run must stop: a store failure or an `IndexerError::UpstreamInconsistency`.
    pub async fn apply(&self, log: &LogEvent) -> Result<ApplyResult> {
        let meta = &log.meta;

        match &log.event {
            CouncilEvent::CouncilCreated {
                council,
                metadata,
                pool,
            } => {
                if !self.deps.factories.contains(&meta.source) {
                    debug!(source = %meta.source, council = %council, "CouncilCreated from unknown factory, ignoring");
                    return Ok(ApplyResult::NoOp);
                }
                FactoryHandler::new(
                    self.deps.store.as_ref(),
                    self.deps.registry.as_ref(),
                    self.deps.reader.as_ref(),
                )
                .on_council_created(meta, council, metadata, pool)
                .await
            }
            event => {
                if !self.deps.registry.is_registered(&meta.source).await? {
                    debug!(
                        source = %meta.source,
                        event_type = event.event_type(),
                        "Event from unregistered source, ignoring"
                    );
                    return Ok(ApplyResult::NoOp);
                }
                CouncilHandler::new(self.deps.store.as_ref())
                    .handle(meta, event)
                    .await
            }
        }
    }

    /// Apply events in order, stopping at the first error.
    pub async fn apply_batch(&self, logs: &[LogEvent]) -> Result<IndexStats> {
        let mut stats = IndexStats::default();
        for log in logs {
            let result = self.apply(log).await?;
            stats.record(&result, log.meta.position);
        }
        Ok(stats)
    }
}
