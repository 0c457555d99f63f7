//! Encoding, hashing and endpoint helpers.

#![allow(missing_docs)]

use crate::error::{Result, TeeError};
use crate::types::TeeMode;
use sha2::{Digest, Sha256};
use sha3::Keccak256;

pub fn hex_to_bytes(hex_str: &str) -> Result<Vec<u8>> {
    let hex_str = hex_str.trim().trim_start_matches("0x");
    if hex_str.is_empty() {
        return Err(TeeError::config(
            "Invalid hex string: empty after stripping prefix",
        ));
    }
    if hex_str.len() % 2 != 0 {
        return Err(TeeError::config(
            "Invalid hex string: odd number of characters",
        ));
    }
    hex::decode(hex_str).map_err(TeeError::from)
}

pub fn bytes_to_hex(bytes: &[u8]) -> String {
    hex::encode(bytes)
}

pub fn calculate_sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

pub fn calculate_keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Resolve the simulator endpoint for a mode string.
///
/// `None` means the hardware-provided default channel (production).
pub fn get_tee_endpoint(mode: &str) -> Result<Option<String>> {
    let mode = TeeMode::parse(mode)?;
    if !mode.is_enabled() {
        return Err(TeeError::config(
            "TEE_MODE is OFF; no TEE endpoint is available",
        ));
    }
    Ok(mode.simulator_endpoint().map(str::to_string))
}

pub fn current_timestamp_ms() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

/// EIP-55 mixed-case rendering of a 20-byte account address.
pub fn to_checksum_address(address: &[u8; 20]) -> String {
    let lower = bytes_to_hex(address);
    let hash = calculate_keccak256(lower.as_bytes());

    let mut out = String::with_capacity(42);
    out.push_str("0x");
    for (i, c) in lower.chars().enumerate() {
        let nibble = if i % 2 == 0 {
            hash[i / 2] >> 4
        } else {
            hash[i / 2] & 0x0f
        };
        if c.is_ascii_alphabetic() && nibble >= 8 {
            out.push(c.to_ascii_uppercase());
        } else {
            out.push(c);
        }
    }
    out
}

/// Truncate a payload for log previews without splitting a UTF-8 char.
pub(crate) fn preview(data: &str, max: usize) -> &str {
    if data.len() <= max {
        return data;
    }
    let mut end = max;
    while !data.is_char_boundary(end) {
        end -= 1;
    }
    &data[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_to_bytes() {
        let result = hex_to_bytes("0102030405").unwrap();
        assert_eq!(result, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_hex_to_bytes_with_prefix() {
        let result = hex_to_bytes("0x0102030405").unwrap();
        assert_eq!(result, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_hex_to_bytes_empty() {
        assert!(hex_to_bytes("").is_err());
        assert!(hex_to_bytes("0x").is_err());
    }

    #[test]
    fn test_hex_to_bytes_odd_length() {
        assert!(hex_to_bytes("0x123").is_err());
    }

    #[test]
    fn test_calculate_sha256() {
        assert_eq!(
            bytes_to_hex(&calculate_sha256(b"hello")),
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }

    #[test]
    fn test_calculate_keccak256_empty() {
        assert_eq!(
            bytes_to_hex(&calculate_keccak256(b"")),
            "c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
        );
    }

    #[test]
    fn test_get_tee_endpoint() {
        assert_eq!(
            get_tee_endpoint("LOCAL").unwrap(),
            Some("http://localhost:8090".to_string())
        );
        assert_eq!(
            get_tee_endpoint("DOCKER").unwrap(),
            Some("http://host.docker.internal:8090".to_string())
        );
        assert_eq!(get_tee_endpoint("PRODUCTION").unwrap(), None);
        assert!(get_tee_endpoint("OFF").is_err());
        assert!(get_tee_endpoint("INVALID").is_err());
    }

    #[test]
    fn test_checksum_address() {
        let bytes: [u8; 20] = hex::decode("7e5f4552091a69125d5dfcb7b8c2659029395bdf")
            .unwrap()
            .try_into()
            .unwrap();
        assert_eq!(
            to_checksum_address(&bytes),
            "0x7E5F4552091A69125d5DfCb7b8C2659029395Bdf"
        );
    }

    #[test]
    fn test_preview_respects_char_boundaries() {
        assert_eq!(preview("abc", 10), "abc");
        assert_eq!(preview("abcdef", 3), "abc");
        assert_eq!(preview("aé", 2), "a");
    }
}
