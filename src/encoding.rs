//! Hex and Keccak helpers shared by address checksumming, name hashing and
//! the JSON-RPC client.

use sha3::{Digest, Keccak256};

pub fn keccak256(bytes: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(bytes);
    hasher.finalize().into()
}

/// Lowercase hex without a `0x` prefix.
pub fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Decode hex with or without a `0x` prefix. Odd-length input is rejected.
pub fn decode_hex(raw: &str) -> Option<Vec<u8>> {
    let body = strip_hex_prefix(raw);
    if !body.is_ascii() || body.len() % 2 != 0 {
        return None;
    }
    (0..body.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&body[i..i + 2], 16).ok())
        .collect()
}

pub fn strip_hex_prefix(raw: &str) -> &str {
    raw.strip_prefix("0x")
        .or_else(|| raw.strip_prefix("0X"))
        .unwrap_or(raw)
}

/// Parse a JSON-RPC quantity (`0x1a`) into an integer.
pub fn parse_quantity(raw: &str) -> Option<u128> {
    let body = strip_hex_prefix(raw);
    if body.is_empty() {
        return Some(0);
    }
    u128::from_str_radix(body, 16).ok()
}

pub fn to_quantity(value: u128) -> String {
    format!("0x{value:x}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keccak_of_empty_input_matches_known_digest() {
        assert_eq!(
            to_hex(&keccak256(b"")),
            "c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
        );
    }

    #[test]
    fn hex_decoding_accepts_prefix_and_rejects_odd_length() {
        assert_eq!(decode_hex("0x0aff"), Some(vec![0x0a, 0xff]));
        assert_eq!(decode_hex("0aff"), Some(vec![0x0a, 0xff]));
        assert_eq!(decode_hex("0xabc"), None);
        assert_eq!(decode_hex("0xzz"), None);
    }

    #[test]
    fn quantities_round_trip_through_rpc_encoding() {
        assert_eq!(parse_quantity("0x0"), Some(0));
        assert_eq!(parse_quantity("0x"), Some(0));
        assert_eq!(parse_quantity("0xaa36a7"), Some(11_155_111));
        assert_eq!(to_quantity(11_155_111), "0xaa36a7");
    }
}
