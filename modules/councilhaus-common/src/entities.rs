//! Derived entity records. These are the rows the indexer maintains.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::EntityKey;
use crate::types::{Address, Amount, Bytes, RoleId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Council,
    CouncilMember,
    Grantee,
    CouncilManager,
    Allocation,
    Vote,
}

impl EntityKind {
    pub const ALL: [EntityKind; 6] = [
        EntityKind::Council,
        EntityKind::CouncilMember,
        EntityKind::Grantee,
        EntityKind::CouncilManager,
        EntityKind::Allocation,
        EntityKind::Vote,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Council => "council",
            EntityKind::CouncilMember => "council_member",
            EntityKind::Grantee => "grantee",
            EntityKind::CouncilManager => "council_manager",
            EntityKind::Allocation => "allocation",
            EntityKind::Vote => "vote",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Root of everything scoped to one deployed council instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Council {
    pub id: EntityKey,
    pub address: Address,
    pub metadata: Bytes,
    pub pool: Address,
    pub distribution_token: Address,
    /// The only field that changes after creation.
    pub max_allocations_per_member: Amount,
    pub member_manager_role: RoleId,
    pub grantee_manager_role: RoleId,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CouncilMember {
    pub id: EntityKey,
    pub council: EntityKey,
    pub account: Address,
    pub voting_power: Amount,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grantee {
    pub id: EntityKey,
    pub council: EntityKey,
    pub account: Address,
    pub metadata: Bytes,
}

/// One currently-held permission. Removed outright on revocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CouncilManager {
    pub id: EntityKey,
    pub council: EntityKey,
    pub role: RoleId,
    pub account: Address,
    pub created_at: DateTime<Utc>,
}

/// A member's single act of splitting their budget across grantees.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allocation {
    pub id: EntityKey,
    pub council: EntityKey,
    pub council_member: EntityKey,
    pub allocated_at: DateTime<Utc>,
    /// Vote keys in the order of the event's arrays.
    pub votes: Vec<EntityKey>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    pub id: EntityKey,
    pub allocation: EntityKey,
    pub grantee: EntityKey,
    pub amount: Amount,
}

/// Any stored record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Entity {
    Council(Council),
    CouncilMember(CouncilMember),
    Grantee(Grantee),
    CouncilManager(CouncilManager),
    Allocation(Allocation),
    Vote(Vote),
}

impl Entity {
    pub fn kind(&self) -> EntityKind {
        match self {
            Entity::Council(_) => EntityKind::Council,
            Entity::CouncilMember(_) => EntityKind::CouncilMember,
            Entity::Grantee(_) => EntityKind::Grantee,
            Entity::CouncilManager(_) => EntityKind::CouncilManager,
            Entity::Allocation(_) => EntityKind::Allocation,
            Entity::Vote(_) => EntityKind::Vote,
        }
    }

    pub fn key(&self) -> &EntityKey {
        match self {
            Entity::Council(e) => &e.id,
            Entity::CouncilMember(e) => &e.id,
            Entity::Grantee(e) => &e.id,
            Entity::CouncilManager(e) => &e.id,
            Entity::Allocation(e) => &e.id,
            Entity::Vote(e) => &e.id,
        }
    }
}

/// A concrete record type that can be stored as an [`Entity`].
pub trait EntityRecord: Into<Entity> + Sized {
    const KIND: EntityKind;

    fn key(&self) -> &EntityKey;

    /// Unwrap the matching variant; `None` for any other kind.
    fn from_entity(entity: Entity) -> Option<Self>;
}

macro_rules! entity_record {
    ($ty:ident) => {
        impl From<$ty> for Entity {
            fn from(e: $ty) -> Self {
                Entity::$ty(e)
            }
        }

        impl EntityRecord for $ty {
            const KIND: EntityKind = EntityKind::$ty;

            fn key(&self) -> &EntityKey {
                &self.id
            }

            fn from_entity(entity: Entity) -> Option<Self> {
                match entity {
                    Entity::$ty(e) => Some(e),
                    _ => None,
                }
            }
        }
    };
}

entity_record!(Council);
entity_record!(CouncilMember);
entity_record!(Grantee);
entity_record!(CouncilManager);
entity_record!(Allocation);
entity_record!(Vote);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_serializes_with_kind_tag() {
        let c = Address::repeat_byte(0xc1);
        let member = CouncilMember {
            id: EntityKey::council_member(&c, &Address::repeat_byte(1)),
            council: EntityKey::council(&c),
            account: Address::repeat_byte(1),
            voting_power: Amount::from(100),
        };
        let json = serde_json::to_value(Entity::from(member.clone())).unwrap();
        assert_eq!(json["kind"], EntityKind::CouncilMember.as_str());
        assert_eq!(json["voting_power"], "100");

        let back: Entity = serde_json::from_value(json).unwrap();
        assert_eq!(CouncilMember::from_entity(back), Some(member));
    }

    #[test]
    fn from_entity_rejects_other_kinds() {
        let c = Address::repeat_byte(0xc1);
        let grantee = Entity::Grantee(Grantee {
            id: EntityKey::grantee(&c, &Address::repeat_byte(2)),
            council: EntityKey::council(&c),
            account: Address::repeat_byte(2),
            metadata: Bytes::default(),
        });
        assert_eq!(grantee.kind(), EntityKind::Grantee);
        assert!(CouncilMember::from_entity(grantee).is_none());
    }
}
