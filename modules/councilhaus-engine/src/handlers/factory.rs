//! Factory handler: a new council instance was deployed.

use anyhow::Result;
use tracing::info;

use councilhaus_common::{
    Address, Bytes, Council, EntityKey, EventMeta, IndexerError, GRANTEE_MANAGER_ROLE,
    MEMBER_MANAGER_ROLE,
};

use crate::outcome::ApplyResult;
use crate::traits::{EntityStore, InstanceReader, SourceRegistry};

pub struct FactoryHandler<'a> {
    store: &'a dyn EntityStore,
    registry: &'a dyn SourceRegistry,
    reader: &'a dyn InstanceReader,
}

impl<'a> FactoryHandler<'a> {
    pub fn new(
        store: &'a dyn EntityStore,
        registry: &'a dyn SourceRegistry,
        reader: &'a dyn InstanceReader,
    ) -> Self {
        Self {
            store,
            registry,
            reader,
        }
    }

    /// Save the Council, then start routing the instance's events.
    ///
    /// Registration happens strictly after the save so a replay never sees a
    /// registered instance without its Council.
    pub async fn on_council_created(
        &self,
        meta: &EventMeta,
        council: &Address,
        metadata: &Bytes,
        pool: &Address,
    ) -> Result<ApplyResult> {
        let block_number = meta.block_number();
        let state = self
            .reader
            .read_instance(council, block_number)
            .await
            .map_err(|e| IndexerError::UpstreamInconsistency {
                instance: *council,
                block_number,
                reason: format!("{e:#}"),
            })?;

        let entity = Council {
            id: EntityKey::council(council),
            address: *council,
            metadata: metadata.clone(),
            pool: *pool,
            distribution_token: state.distribution_token,
            max_allocations_per_member: state.max_allocations_per_member,
            member_manager_role: *MEMBER_MANAGER_ROLE,
            grantee_manager_role: *GRANTEE_MANAGER_ROLE,
            created_at: meta.block_timestamp,
        };
        self.store.save(entity.into()).await?;
        self.registry.register_instance(council).await?;

        info!(
            council = %council,
            pool = %pool,
            distribution_token = %state.distribution_token,
            metadata_bytes = metadata.as_slice().len(),
            block_number,
            "Council created"
        );
        Ok(ApplyResult::Applied)
    }
}
