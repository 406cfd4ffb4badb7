//! Deterministic entity identities.
//!
//! Every key is an ordered tuple of typed components derived from immutable event
//! fields, so replaying an event lands on the same record. The canonical string
//! form length-prefixes each component (`<len>:<text>`), which keeps it
//! collision-free whatever characters a component contains.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use crate::types::{Address, RoleId, B256};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum KeyParseError {
    #[error("missing length prefix at byte {0}")]
    MissingLength(usize),

    #[error("component at byte {offset} claims {len} bytes but only {remaining} remain")]
    Truncated {
        offset: usize,
        len: usize,
        remaining: usize,
    },

    #[error("component at byte {0} is not valid UTF-8")]
    InvalidUtf8(usize),

    #[error("empty key")]
    Empty,
}

/// Composite identity of a stored record.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityKey {
    parts: Vec<String>,
}

impl EntityKey {
    fn from_parts(parts: Vec<String>) -> Self {
        Self { parts }
    }

    pub fn council(instance: &Address) -> Self {
        Self::from_parts(vec![instance.to_string()])
    }

    pub fn council_member(instance: &Address, member: &Address) -> Self {
        Self::from_parts(vec![instance.to_string(), member.to_string()])
    }

    pub fn grantee(instance: &Address, grantee: &Address) -> Self {
        Self::from_parts(vec![instance.to_string(), grantee.to_string()])
    }

    pub fn council_manager(instance: &Address, role: &RoleId, account: &Address) -> Self {
        Self::from_parts(vec![
            instance.to_string(),
            role.to_string(),
            account.to_string(),
        ])
    }

    pub fn allocation(transaction_hash: &B256, log_index: u32) -> Self {
        Self::from_parts(vec![transaction_hash.to_string(), log_index.to_string()])
    }

    /// Vote identity. The log index disambiguates two allocations by the same
    /// member in one block; `position` is the pair's index in the allocation
    /// arrays, so a grantee listed twice gets two votes.
    pub fn vote(
        member: &Address,
        grantee: &Address,
        block_timestamp: &DateTime<Utc>,
        log_index: u32,
        position: usize,
    ) -> Self {
        Self::from_parts(vec![
            member.to_string(),
            grantee.to_string(),
            block_timestamp.timestamp().to_string(),
            log_index.to_string(),
            position.to_string(),
        ])
    }

    pub fn parts(&self) -> &[String] {
        &self.parts
    }

    /// Canonical, collision-free serialization used as the storage id.
    pub fn canonical(&self) -> String {
        let mut out = String::new();
        for part in &self.parts {
            out.push_str(&part.len().to_string());
            out.push(':');
            out.push_str(part);
        }
        out
    }

    /// Inverse of [`EntityKey::canonical`].
    pub fn parse(canonical: &str) -> Result<Self, KeyParseError> {
        let bytes = canonical.as_bytes();
        let mut parts = Vec::new();
        let mut offset = 0;

        while offset < bytes.len() {
            let rest = &canonical[offset..];
            let colon = rest.find(':').ok_or(KeyParseError::MissingLength(offset))?;
            let len: usize = rest[..colon]
                .parse()
                .map_err(|_| KeyParseError::MissingLength(offset))?;
            let start = offset + colon + 1;
            let remaining = bytes.len() - start;
            if len > remaining {
                return Err(KeyParseError::Truncated {
                    offset,
                    len,
                    remaining,
                });
            }
            let part = std::str::from_utf8(&bytes[start..start + len])
                .map_err(|_| KeyParseError::InvalidUtf8(start))?;
            parts.push(part.to_string());
            offset = start + len;
        }

        if parts.is_empty() {
            return Err(KeyParseError::Empty);
        }
        Ok(Self::from_parts(parts))
    }
}

/// Human-readable form for logs only. Not collision-free.
impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.parts.join("-"))
    }
}

impl fmt::Debug for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityKey({self})")
    }
}

impl Serialize for EntityKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.canonical())
    }
}

impl<'de> Deserialize<'de> for EntityKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn same_inputs_produce_same_key() {
        let c = Address::repeat_byte(0xc1);
        let m = Address::repeat_byte(0x01);
        assert_eq!(
            EntityKey::council_member(&c, &m),
            EntityKey::council_member(&c, &m)
        );
    }

    #[test]
    fn member_and_grantee_keys_for_same_pair_are_equal_but_scoped_by_instance() {
        let c1 = Address::repeat_byte(0xc1);
        let c2 = Address::repeat_byte(0xc2);
        let a = Address::repeat_byte(0xaa);
        assert_ne!(EntityKey::grantee(&c1, &a), EntityKey::grantee(&c2, &a));
    }

    #[test]
    fn canonical_form_is_collision_free_for_separator_bearing_parts() {
        // With naive "-" joining these would both render as "a-b-c".
        let left = EntityKey::from_parts(vec!["a-b".into(), "c".into()]);
        let right = EntityKey::from_parts(vec!["a".into(), "b-c".into()]);
        assert_eq!(left.to_string(), right.to_string());
        assert_ne!(left.canonical(), right.canonical());
    }

    #[test]
    fn canonical_parses_back() {
        let ts = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let key = EntityKey::vote(
            &Address::repeat_byte(1),
            &Address::repeat_byte(2),
            &ts,
            7,
            0,
        );
        assert_eq!(EntityKey::parse(&key.canonical()).unwrap(), key);
        assert_eq!(key.parts()[2], "1700000000");
    }

    #[test]
    fn vote_keys_differ_by_array_position() {
        let ts = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let member = Address::repeat_byte(1);
        let grantee = Address::repeat_byte(2);
        assert_ne!(
            EntityKey::vote(&member, &grantee, &ts, 7, 0),
            EntityKey::vote(&member, &grantee, &ts, 7, 1)
        );
    }

    #[test]
    fn parse_rejects_truncated_input() {
        assert!(matches!(
            EntityKey::parse("10:abc"),
            Err(KeyParseError::Truncated { .. })
        ));
        assert_eq!(EntityKey::parse(""), Err(KeyParseError::Empty));
        assert_eq!(EntityKey::parse("abc"), Err(KeyParseError::MissingLength(0)));
    }

    #[test]
    fn serde_uses_canonical_form() {
        let key = EntityKey::allocation(&B256::repeat_byte(0xab), 3);
        let json = serde_json::to_string(&key).unwrap();
        assert_eq!(json, format!("\"{}\"", key.canonical()));
        let back: EntityKey = serde_json::from_str(&json).unwrap();
        assert_eq!(back, key);
    }
}
