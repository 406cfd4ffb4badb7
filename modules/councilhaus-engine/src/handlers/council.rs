//! Council handler: every event emitted by a registered council instance.
//!
//! Creates and updates are idempotent upserts keyed by deterministic identity;
//! deletes of absent records are no-ops. Events whose parent record is missing
//! are logged and skipped, never partially applied.

use anyhow::Result;
use tracing::{debug, warn};

use councilhaus_common::{
    Address, Allocation, Amount, BudgetAllocation, Bytes, Council, CouncilEvent, CouncilManager,
    CouncilMember, Entity, EntityKey, EntityKind, EventMeta, Grantee, RoleId, Vote,
};

use crate::outcome::{ApplyResult, SkipReason};
use crate::traits::{load_as, EntityStore};

pub struct CouncilHandler<'a> {
    store: &'a dyn EntityStore,
}

impl<'a> CouncilHandler<'a> {
    pub fn new(store: &'a dyn EntityStore) -> Self {
        Self { store }
    }

    /// Apply one instance-scoped event. `meta.source` is the instance address.
    pub async fn handle(&self, meta: &EventMeta, event: &CouncilEvent) -> Result<ApplyResult> {
        match event {
            CouncilEvent::RoleGranted { role, account } => {
                self.on_role_granted(meta, role, account).await
            }
            CouncilEvent::RoleRevoked { role, account } => {
                self.on_role_revoked(meta, role, account).await
            }
            CouncilEvent::CouncilMemberAdded {
                member,
                voting_power,
            } => self.on_member_added(meta, member, voting_power).await,
            CouncilEvent::CouncilMemberRemoved { member } => {
                self.on_member_removed(meta, member).await
            }
            CouncilEvent::CouncilMemberEdited {
                member,
                voting_power,
            } => self.on_member_edited(meta, member, voting_power).await,
            CouncilEvent::GranteeAdded { grantee, metadata } => {
                self.on_grantee_added(meta, grantee, metadata).await
            }
            CouncilEvent::GranteeRemoved { grantee } => {
                self.on_grantee_removed(meta, grantee).await
            }
            CouncilEvent::BudgetAllocated { member, allocation } => {
                self.on_budget_allocated(meta, member, allocation).await
            }
            CouncilEvent::MaxAllocationsPerMemberSet {
                max_allocations_per_member,
            } => {
                self.on_max_allocations_per_member_set(meta, max_allocations_per_member)
                    .await
            }
            CouncilEvent::CouncilCreated { council, .. } => {
                debug!(
                    source = %meta.source,
                    council = %council,
                    "CouncilCreated emitted by an instance, ignoring"
                );
                Ok(ApplyResult::NoOp)
            }
        }
    }

    // =================================================================
    // Access control
    // =================================================================

    pub async fn on_role_granted(
        &self,
        meta: &EventMeta,
        role: &RoleId,
        account: &Address,
    ) -> Result<ApplyResult> {
        let council_key = EntityKey::council(&meta.source);
        if load_as::<Council>(self.store, &council_key).await?.is_none() {
            warn!(
                council = %meta.source,
                role = %role,
                account = %account,
                "Council not found, skipping role grant"
            );
            return Ok(ApplyResult::Skipped(SkipReason::MissingParentReference {
                kind: EntityKind::Council,
                key: council_key,
            }));
        }

        let manager = CouncilManager {
            id: EntityKey::council_manager(&meta.source, role, account),
            council: council_key,
            role: *role,
            account: *account,
            created_at: meta.block_timestamp,
        };
        self.store.save(manager.into()).await?;
        Ok(ApplyResult::Applied)
    }

    pub async fn on_role_revoked(
        &self,
        meta: &EventMeta,
        role: &RoleId,
        account: &Address,
    ) -> Result<ApplyResult> {
        let key = EntityKey::council_manager(&meta.source, role, account);
        self.remove(EntityKind::CouncilManager, key).await
    }

    // =================================================================
    // Membership
    // =================================================================

    pub async fn on_member_added(
        &self,
        meta: &EventMeta,
        member: &Address,
        voting_power: &Amount,
    ) -> Result<ApplyResult> {
        let record = CouncilMember {
            id: EntityKey::council_member(&meta.source, member),
            council: EntityKey::council(&meta.source),
            account: *member,
            voting_power: voting_power.clone(),
        };
        self.store.save(record.into()).await?;
        Ok(ApplyResult::Applied)
    }

    pub async fn on_member_removed(&self, meta: &EventMeta, member: &Address) -> Result<ApplyResult> {
        let key = EntityKey::council_member(&meta.source, member);
        self.remove(EntityKind::CouncilMember, key).await
    }

    pub async fn on_member_edited(
        &self,
        meta: &EventMeta,
        member: &Address,
        voting_power: &Amount,
    ) -> Result<ApplyResult> {
        let key = EntityKey::council_member(&meta.source, member);
        let Some(mut record) = load_as::<CouncilMember>(self.store, &key).await? else {
            warn!(council_member = %key, "Council member not found, skipping edit");
            return Ok(ApplyResult::Skipped(SkipReason::MissingParentReference {
                kind: EntityKind::CouncilMember,
                key,
            }));
        };

        record.voting_power = voting_power.clone();
        self.store.save(record.into()).await?;
        Ok(ApplyResult::Applied)
    }

    // =================================================================
    // Grantee registry
    // =================================================================

    pub async fn on_grantee_added(
        &self,
        meta: &EventMeta,
        grantee: &Address,
        metadata: &Bytes,
    ) -> Result<ApplyResult> {
        let record = Grantee {
            id: EntityKey::grantee(&meta.source, grantee),
            council: EntityKey::council(&meta.source),
            account: *grantee,
            metadata: metadata.clone(),
        };
        self.store.save(record.into()).await?;
        Ok(ApplyResult::Applied)
    }

    pub async fn on_grantee_removed(&self, meta: &EventMeta, grantee: &Address) -> Result<ApplyResult> {
        let key = EntityKey::grantee(&meta.source, grantee);
        self.remove(EntityKind::Grantee, key).await
    }

    // =================================================================
    // Configuration
    // =================================================================

    pub async fn on_max_allocations_per_member_set(
        &self,
        meta: &EventMeta,
        max_allocations_per_member: &Amount,
    ) -> Result<ApplyResult> {
        let key = EntityKey::council(&meta.source);
        let Some(mut council) = load_as::<Council>(self.store, &key).await? else {
            debug!(council = %meta.source, "Council not found, skipping max allocations update");
            return Ok(ApplyResult::Skipped(SkipReason::MissingParentReference {
                kind: EntityKind::Council,
                key,
            }));
        };

        council.max_allocations_per_member = max_allocations_per_member.clone();
        self.store.save(council.into()).await?;
        Ok(ApplyResult::Applied)
    }

    // =================================================================
    // Budget allocation
    // =================================================================

    /// Validate every reference first, then write the votes and the allocation
    /// together. Nothing is written unless every grantee resolves.
    pub async fn on_budget_allocated(
        &self,
        meta: &EventMeta,
        member: &Address,
        allocation: &BudgetAllocation,
    ) -> Result<ApplyResult> {
        let member_key = EntityKey::council_member(&meta.source, member);
        let Some(council_member) = load_as::<CouncilMember>(self.store, &member_key).await? else {
            warn!(
                council = %meta.source,
                member = %member,
                "Council member not found, skipping allocation"
            );
            return Ok(ApplyResult::Skipped(SkipReason::MissingParentReference {
                kind: EntityKind::CouncilMember,
                key: member_key,
            }));
        };

        let BudgetAllocation { accounts, amounts } = allocation;
        if accounts.len() != amounts.len() {
            warn!(
                council = %meta.source,
                member = %member,
                accounts = accounts.len(),
                amounts = amounts.len(),
                "Allocation arrays differ in length, skipping allocation"
            );
            return Ok(ApplyResult::Skipped(SkipReason::MalformedAllocation {
                accounts: accounts.len(),
                amounts: amounts.len(),
            }));
        }

        let allocation_key = EntityKey::allocation(&meta.transaction_hash, meta.log_index());

        // Phase 1: resolve everything, write nothing.
        let mut votes = Vec::with_capacity(accounts.len());
        let mut missing = Vec::new();
        for (position, (account, amount)) in accounts.iter().zip(amounts).enumerate() {
            let grantee_key = EntityKey::grantee(&meta.source, account);
            match load_as::<Grantee>(self.store, &grantee_key).await? {
                Some(grantee) => votes.push(Vote {
                    id: EntityKey::vote(
                        member,
                        account,
                        &meta.block_timestamp,
                        meta.log_index(),
                        position,
                    ),
                    allocation: allocation_key.clone(),
                    grantee: grantee.id,
                    amount: amount.clone(),
                }),
                None => missing.push(grantee_key),
            }
        }

        if !missing.is_empty() {
            let missing_ids: Vec<String> = missing.iter().map(ToString::to_string).collect();
            warn!(
                council = %meta.source,
                member = %member,
                missing = ?missing_ids,
                "Not all grantees found, skipping allocation"
            );
            return Ok(ApplyResult::Skipped(SkipReason::PartialAllocation {
                member: council_member.id,
                missing,
            }));
        }

        // Phase 2: commit votes and the allocation that lists them.
        let record = Allocation {
            id: allocation_key,
            council: council_member.council.clone(),
            council_member: council_member.id,
            allocated_at: meta.block_timestamp,
            votes: votes.iter().map(|v| v.id.clone()).collect(),
        };
        let mut batch: Vec<Entity> = votes.into_iter().map(Entity::from).collect();
        batch.push(record.into());
        self.store.save_all(batch).await?;

        Ok(ApplyResult::Applied)
    }

    async fn remove(&self, kind: EntityKind, key: EntityKey) -> Result<ApplyResult> {
        if self.store.remove(kind, &key).await? {
            Ok(ApplyResult::Applied)
        } else {
            debug!(kind = %kind, key = %key, "Nothing to remove");
            Ok(ApplyResult::NoOp)
        }
    }
}
