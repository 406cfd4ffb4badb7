//! Access-control role identifiers and the keccak helper behind them.

use std::sync::LazyLock;

use sha3::{Digest, Keccak256};

use crate::types::{RoleId, B256};

pub fn keccak256(data: impl AsRef<[u8]>) -> B256 {
    B256(Keccak256::digest(data.as_ref()).into())
}

pub static MEMBER_MANAGER_ROLE: LazyLock<RoleId> =
    LazyLock::new(|| keccak256("MEMBER_MANAGER_ROLE"));

pub static GRANTEE_MANAGER_ROLE: LazyLock<RoleId> =
    LazyLock::new(|| keccak256("GRANTEE_MANAGER_ROLE"));
