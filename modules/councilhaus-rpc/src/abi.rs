//! Just enough of the contract ABI for zero-argument view calls: function
//! selectors and single static return words.

use councilhaus_common::{keccak256, Address, Amount};

use crate::error::{Result, RpcError};

const WORD: usize = 32;

/// First four bytes of the keccak hash of a canonical function signature.
pub fn selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    let mut out = [0u8; 4];
    out.copy_from_slice(&hash.as_bytes()[..4]);
    out
}

/// `0x`-prefixed hex of arbitrary bytes, as JSON-RPC expects.
pub fn encode_hex(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

/// Decode a `0x`-prefixed hex string returned by the node.
pub fn decode_hex(s: &str) -> Result<Vec<u8>> {
    let digits = s.strip_prefix("0x").unwrap_or(s);
    hex::decode(digits).map_err(|e| RpcError::Decode(format!("bad hex {s:?}: {e}")))
}

fn first_word(data: &[u8]) -> Result<&[u8]> {
    data.get(..WORD).ok_or_else(|| {
        RpcError::Decode(format!(
            "return data is {} bytes, expected at least {WORD}",
            data.len()
        ))
    })
}

/// An `address` return value: right-aligned in the word, high bytes zero.
pub fn decode_address(data: &[u8]) -> Result<Address> {
    let word = first_word(data)?;
    let (padding, address) = word.split_at(WORD - 20);
    if padding.iter().any(|b| *b != 0) {
        return Err(RpcError::Decode(format!(
            "word {} is not an address",
            encode_hex(word)
        )));
    }
    Address::from_slice(address).map_err(|e| RpcError::Decode(e.to_string()))
}

/// A `uint256` return value.
pub fn decode_uint(data: &[u8]) -> Result<Amount> {
    Ok(Amount::from_be_bytes(first_word(data)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn word(tail: &[u8]) -> Vec<u8> {
        let mut w = vec![0u8; WORD - tail.len()];
        w.extend_from_slice(tail);
        w
    }

    #[test]
    fn selector_matches_known_signature() {
        assert_eq!(selector("transfer(address,uint256)"), [0xa9, 0x05, 0x9c, 0xbb]);
        assert_eq!(selector("balanceOf(address)"), [0x70, 0xa0, 0x82, 0x31]);
    }

    #[test]
    fn address_is_taken_from_low_bytes() {
        let data = word(&[0x42; 20]);
        assert_eq!(decode_address(&data).unwrap(), Address::repeat_byte(0x42));
    }

    #[test]
    fn dirty_high_bytes_are_not_an_address() {
        let mut data = word(&[0x42; 20]);
        data[0] = 1;
        assert!(matches!(decode_address(&data), Err(RpcError::Decode(_))));
    }

    #[test]
    fn uint_decodes_big_endian() {
        assert_eq!(decode_uint(&word(&[0x01, 0x00])).unwrap(), Amount::from(256));
        assert_eq!(decode_uint(&word(&[])).unwrap(), Amount::zero());
    }

    #[test]
    fn uint_beyond_u64_survives() {
        let mut tail = vec![0x01];
        tail.extend_from_slice(&[0u8; 16]);
        let amount = decode_uint(&word(&tail)).unwrap();
        assert_eq!(amount.to_string(), "340282366920938463463374607431768211456");
    }

    #[test]
    fn short_return_data_is_rejected() {
        assert!(decode_uint(&[0u8; 31]).is_err());
        assert!(decode_address(&[]).is_err());
    }

    #[test]
    fn hex_round_trips_with_prefix() {
        assert_eq!(encode_hex(&[0xde, 0xad]), "0xdead");
        assert_eq!(decode_hex("0xdead").unwrap(), vec![0xde, 0xad]);
        assert_eq!(decode_hex("0x").unwrap(), Vec::<u8>::new());
        assert!(decode_hex("0xzz").is_err());
    }
}
