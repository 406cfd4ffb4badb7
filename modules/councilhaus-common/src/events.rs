//! Decoded contract events, as delivered by the feed.
//!
//! The `type` tag becomes the `event_type` column in the log table.
//! The rest serializes to the `payload` JSONB column.

use serde::{Deserialize, Serialize};

use crate::types::{Address, Amount, Bytes, EventMeta, RoleId};

/// Parallel arrays from a `BudgetAllocated` log. Pairs correspond by index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BudgetAllocation {
    pub accounts: Vec<Address>,
    pub amounts: Vec<Amount>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CouncilEvent {
    // -----------------------------------------------------------------------
    // Factory
    // -----------------------------------------------------------------------
    CouncilCreated {
        council: Address,
        metadata: Bytes,
        pool: Address,
    },

    // -----------------------------------------------------------------------
    // Access control
    // -----------------------------------------------------------------------
    RoleGranted {
        role: RoleId,
        account: Address,
    },

    RoleRevoked {
        role: RoleId,
        account: Address,
    },

    // -----------------------------------------------------------------------
    // Membership
    // -----------------------------------------------------------------------
    CouncilMemberAdded {
        member: Address,
        voting_power: Amount,
    },

    CouncilMemberRemoved {
        member: Address,
    },

    CouncilMemberEdited {
        member: Address,
        voting_power: Amount,
    },

    // -----------------------------------------------------------------------
    // Grantee registry
    // -----------------------------------------------------------------------
    GranteeAdded {
        grantee: Address,
        metadata: Bytes,
    },

    GranteeRemoved {
        grantee: Address,
    },

    // -----------------------------------------------------------------------
    // Budget and configuration
    // -----------------------------------------------------------------------
    BudgetAllocated {
        member: Address,
        allocation: BudgetAllocation,
    },

    MaxAllocationsPerMemberSet {
        max_allocations_per_member: Amount,
    },
}

impl CouncilEvent {
    /// The serde tag for this variant.
    pub fn event_type(&self) -> &'static str {
        match self {
            CouncilEvent::CouncilCreated { .. } => "council_created",
            CouncilEvent::RoleGranted { .. } => "role_granted",
            CouncilEvent::RoleRevoked { .. } => "role_revoked",
            CouncilEvent::CouncilMemberAdded { .. } => "council_member_added",
            CouncilEvent::CouncilMemberRemoved { .. } => "council_member_removed",
            CouncilEvent::CouncilMemberEdited { .. } => "council_member_edited",
            CouncilEvent::GranteeAdded { .. } => "grantee_added",
            CouncilEvent::GranteeRemoved { .. } => "grantee_removed",
            CouncilEvent::BudgetAllocated { .. } => "budget_allocated",
            CouncilEvent::MaxAllocationsPerMemberSet { .. } => "max_allocations_per_member_set",
        }
    }

    /// Serialize this event to a JSON Value for the log table payload.
    pub fn to_payload(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::to_value(self)
    }

    pub fn from_payload(payload: &serde_json::Value) -> Result<Self, serde_json::Error> {
        Self::deserialize(payload)
    }
}

/// One decoded log together with its chain context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEvent {
    pub meta: EventMeta,
    pub event: CouncilEvent,
}

impl LogEvent {
    pub fn new(meta: EventMeta, event: CouncilEvent) -> Self {
        Self { meta, event }
    }
}
