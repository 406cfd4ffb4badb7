//! Chain primitives shared by every crate: fixed-width hex values, metadata blobs,
//! arbitrary-precision amounts, and log positions.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use num_bigint::BigUint;
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Failure to parse a hex-encoded chain value.
#[derive(Debug, Error, PartialEq)]
pub enum HexError {
    #[error("invalid hex: {0}")]
    InvalidDigit(#[from] hex::FromHexError),

    #[error("expected {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
}

fn decode_hex(s: &str) -> Result<Vec<u8>, HexError> {
    let digits = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);
    Ok(hex::decode(digits)?)
}

// ---------------------------------------------------------------------------
// Fixed-width values (Address, B256)
// ---------------------------------------------------------------------------

macro_rules! fixed_bytes {
    ($(#[$doc:meta])* $name:ident, $len:expr) => {
        $(#[$doc])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
        pub struct $name(pub [u8; $len]);

        impl $name {
            pub const LEN: usize = $len;

            /// A value with every byte set to `byte`. Handy for fixtures.
            pub const fn repeat_byte(byte: u8) -> Self {
                Self([byte; $len])
            }

            pub fn from_slice(bytes: &[u8]) -> Result<Self, HexError> {
                let arr: [u8; $len] = bytes.try_into().map_err(|_| HexError::InvalidLength {
                    expected: $len,
                    actual: bytes.len(),
                })?;
                Ok(Self(arr))
            }

            pub fn as_bytes(&self) -> &[u8; $len] {
                &self.0
            }
        }

        impl FromStr for $name {
            type Err = HexError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::from_slice(&decode_hex(s)?)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "0x{}", hex::encode(self.0))
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self)
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.collect_str(self)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                s.parse().map_err(de::Error::custom)
            }
        }
    };
}

fixed_bytes!(
    /// A 20-byte account or contract address.
    Address,
    20
);

fixed_bytes!(
    /// A 32-byte word: role identifiers and transaction hashes.
    B256,
    32
);

/// A role identifier is a keccak-256 hash of the role's ASCII name.
pub type RoleId = B256;

// ---------------------------------------------------------------------------
// Bytes
// ---------------------------------------------------------------------------

/// Opaque byte blob (council and grantee metadata).
#[derive(Clone, PartialEq, Eq, Hash, Default)]
pub struct Bytes(pub Vec<u8>);

impl Bytes {
    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }
}

impl From<Vec<u8>> for Bytes {
    fn from(v: Vec<u8>) -> Self {
        Self(v)
    }
}

impl From<&[u8]> for Bytes {
    fn from(v: &[u8]) -> Self {
        Self(v.to_vec())
    }
}

impl FromStr for Bytes {
    type Err = HexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(decode_hex(s)?))
    }
}

impl fmt::Display for Bytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(&self.0))
    }
}

impl fmt::Debug for Bytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Bytes({self})")
    }
}

impl Serialize for Bytes {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Bytes {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// Amount
// ---------------------------------------------------------------------------

/// Non-negative integer of unbounded magnitude (voting power, allocation amounts,
/// uint256 contract values). Serialized as a decimal string.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Amount(pub BigUint);

impl Amount {
    pub fn zero() -> Self {
        Self(BigUint::default())
    }

    /// Decode a big-endian unsigned integer (e.g. an ABI word).
    pub fn from_be_bytes(bytes: &[u8]) -> Self {
        Self(BigUint::from_bytes_be(bytes))
    }

    pub fn as_biguint(&self) -> &BigUint {
        &self.0
    }
}

impl From<u64> for Amount {
    fn from(v: u64) -> Self {
        Self(BigUint::from(v))
    }
}

impl From<BigUint> for Amount {
    fn from(v: BigUint) -> Self {
        Self(v)
    }
}

impl FromStr for Amount {
    type Err = num_bigint::ParseBigIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl fmt::Debug for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Amount({})", self.0)
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct AmountVisitor;

        impl Visitor<'_> for AmountVisitor {
            type Value = Amount;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a non-negative integer or decimal string")
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Amount, E> {
                Ok(Amount::from(v))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Amount, E> {
                u64::try_from(v)
                    .map(Amount::from)
                    .map_err(|_| E::custom(format!("negative amount: {v}")))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Amount, E> {
                v.parse().map_err(E::custom)
            }
        }

        deserializer.deserialize_any(AmountVisitor)
    }
}

// ---------------------------------------------------------------------------
// Positions and event metadata
// ---------------------------------------------------------------------------

/// Where a log sits in the chain's total order. Field order gives the
/// derived `Ord`: block height, then transaction, then log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct LogPosition {
    pub block_number: u64,
    pub transaction_index: u32,
    pub log_index: u32,
}

impl LogPosition {
    pub const fn new(block_number: u64, transaction_index: u32, log_index: u32) -> Self {
        Self {
            block_number,
            transaction_index,
            log_index,
        }
    }

    /// First possible position in a block.
    pub const fn start_of_block(block_number: u64) -> Self {
        Self::new(block_number, 0, 0)
    }

    /// The smallest position strictly after this one.
    pub fn next(&self) -> Self {
        if let Some(log_index) = self.log_index.checked_add(1) {
            return Self { log_index, ..*self };
        }
        match self.transaction_index.checked_add(1) {
            Some(transaction_index) => Self::new(self.block_number, transaction_index, 0),
            None => Self::start_of_block(self.block_number.saturating_add(1)),
        }
    }
}

impl fmt::Display for LogPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}",
            self.block_number, self.transaction_index, self.log_index
        )
    }
}

/// Block and transaction context attached to every event by the feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventMeta {
    /// Address of the contract that emitted the log.
    pub source: Address,
    pub position: LogPosition,
    pub block_timestamp: DateTime<Utc>,
    pub transaction_hash: B256,
}

impl EventMeta {
    pub fn block_number(&self) -> u64 {
        self.position.block_number
    }

    pub fn log_index(&self) -> u32 {
        self.position.log_index
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_parses_mixed_case_and_displays_lowercase() {
        let addr: Address = "0xAbCdEf0000000000000000000000000000000001".parse().unwrap();
        assert_eq!(addr.to_string(), "0xabcdef0000000000000000000000000000000001");
    }

    #[test]
    fn address_rejects_wrong_length() {
        let err = "0x1234".parse::<Address>().unwrap_err();
        assert_eq!(
            err,
            HexError::InvalidLength {
                expected: 20,
                actual: 2
            }
        );
    }

    #[test]
    fn address_rejects_non_hex_digits() {
        let err = "0xzz".parse::<Address>().unwrap_err();
        assert!(matches!(err, HexError::InvalidDigit(_)));
        assert_ne!(err, HexError::InvalidLength { expected: 20, actual: 0 });
    }

    #[test]
    fn amount_serializes_as_decimal_string() {
        let huge: Amount = "115792089237316195423570985008687907853269984665640564039457584007913129639935"
            .parse()
            .unwrap();
        let json = serde_json::to_value(&huge).unwrap();
        assert_eq!(
            json,
            serde_json::json!("115792089237316195423570985008687907853269984665640564039457584007913129639935")
        );
        let back: Amount = serde_json::from_value(json).unwrap();
        assert_eq!(back, huge);
    }

    #[test]
    fn amount_accepts_plain_json_numbers() {
        let a: Amount = serde_json::from_str("100").unwrap();
        assert_eq!(a, Amount::from(100));
        assert!(serde_json::from_str::<Amount>("-1").is_err());
    }

    #[test]
    fn log_positions_order_by_block_then_tx_then_log() {
        let a = LogPosition::new(10, 5, 9);
        let b = LogPosition::new(10, 6, 0);
        let c = LogPosition::new(11, 0, 0);
        assert!(a < b && b < c);
        assert_eq!(a.next(), LogPosition::new(10, 5, 10));
        assert!(a < a.next());
    }

    #[test]
    fn next_rolls_over_exhausted_indices() {
        let p = LogPosition::new(7, 3, u32::MAX);
        assert_eq!(p.next(), LogPosition::new(7, 4, 0));
    }
}
