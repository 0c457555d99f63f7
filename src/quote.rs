//! TDX quote inspection.
//!
//! A quote is only useful to a verifier if the 64-byte report-data field it
//! carries can be tied back to the payload that was attested. This module
//! parses the fixed-layout v4 header and TD report body, and recomputes the
//! report-data field for a payload so the two can be compared.

use sha2::{Digest, Sha256, Sha384, Sha512};

use crate::error::{Result, TeeError};
use crate::types::{RemoteAttestationQuote, TdxQuoteHashAlgorithm};

/// Quote header length.
pub const HEADER_SIZE: usize = 48;

/// TD report body length in a v4 quote.
pub const BODY_SIZE_V4: usize = 584;

/// Offset of `mrtd` within the body.
const MRTD_OFFSET: usize = 136;

/// Offset of the report-data field within the body.
const REPORT_DATA_OFFSET: usize = 520;

/// Size of the report-data field.
pub const REPORT_DATA_SIZE: usize = 64;

const MEASUREMENT_SIZE: usize = 48;

/// TEE type tag for TDX in the quote header.
pub const TEE_TYPE_TDX: u32 = 0x0000_0081;

/// Parsed view of the fields this crate cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TdxQuote {
    /// Quote format version (4 or 5).
    pub version: u16,
    /// Attestation key type from the header.
    pub attestation_key_type: u16,
    /// TEE type; `0x81` for TDX.
    pub tee_type: u32,
    /// Build-time measurement of the TD.
    pub mrtd: [u8; MEASUREMENT_SIZE],
    /// Caller-chosen data bound into the quote.
    pub report_data: [u8; REPORT_DATA_SIZE],
}

impl TdxQuote {
    /// Parse header and body of a raw quote.
    ///
    /// # Errors
    ///
    /// Returns an attestation error for truncated quotes, unsupported versions,
    /// or non-TDX tee types.
    pub fn parse(raw: &[u8]) -> Result<Self> {
        if raw.len() < HEADER_SIZE + BODY_SIZE_V4 {
            return Err(TeeError::attestation(format!(
                "quote too short: {} bytes, need at least {}",
                raw.len(),
                HEADER_SIZE + BODY_SIZE_V4
            )));
        }

        let version = u16::from_le_bytes([raw[0], raw[1]]);
        if version != 4 && version != 5 {
            return Err(TeeError::attestation(format!(
                "unsupported quote version: {}",
                version
            )));
        }
        let attestation_key_type = u16::from_le_bytes([raw[2], raw[3]]);
        let tee_type = u32::from_le_bytes([raw[4], raw[5], raw[6], raw[7]]);
        if tee_type != TEE_TYPE_TDX {
            return Err(TeeError::attestation(format!(
                "not a TDX quote: tee_type={:#x}",
                tee_type
            )));
        }

        // v5 quotes carry a 6-byte body descriptor (type u16, size u32) after the header.
        let body_start = if version == 5 { HEADER_SIZE + 6 } else { HEADER_SIZE };
        if raw.len() < body_start + BODY_SIZE_V4 {
            return Err(TeeError::attestation("quote body truncated"));
        }
        let body = &raw[body_start..body_start + BODY_SIZE_V4];

        let mut mrtd = [0u8; MEASUREMENT_SIZE];
        mrtd.copy_from_slice(&body[MRTD_OFFSET..MRTD_OFFSET + MEASUREMENT_SIZE]);
        let mut report_data = [0u8; REPORT_DATA_SIZE];
        report_data
            .copy_from_slice(&body[REPORT_DATA_OFFSET..REPORT_DATA_OFFSET + REPORT_DATA_SIZE]);

        Ok(Self {
            version,
            attestation_key_type,
            tee_type,
            mrtd,
            report_data,
        })
    }
}

/// The 64-byte report-data field a quote carries for `payload`.
///
/// Hashed variants are zero-padded on the right. `Raw` embeds the payload
/// bytes directly and rejects payloads longer than 64 bytes.
pub fn report_data_digest(
    payload: &[u8],
    algorithm: TdxQuoteHashAlgorithm,
) -> Result<[u8; REPORT_DATA_SIZE]> {
    let digest: Vec<u8> = match algorithm {
        TdxQuoteHashAlgorithm::Sha256 => Sha256::digest(payload).to_vec(),
        TdxQuoteHashAlgorithm::Sha384 => Sha384::digest(payload).to_vec(),
        TdxQuoteHashAlgorithm::Sha512 => Sha512::digest(payload).to_vec(),
        TdxQuoteHashAlgorithm::Raw => {
            if payload.len() > REPORT_DATA_SIZE {
                return Err(TeeError::invalid_argument(format!(
                    "raw report data is {} bytes, limit is {}",
                    payload.len(),
                    REPORT_DATA_SIZE
                )));
            }
            payload.to_vec()
        }
    };

    let mut out = [0u8; REPORT_DATA_SIZE];
    out[..digest.len()].copy_from_slice(&digest);
    Ok(out)
}

/// Check that `quote` embeds the digest of `expected_payload`.
///
/// Compares the payload recorded on the quote first, then the report-data
/// field inside the hardware quote itself.
pub fn verify_report_binding(quote: &RemoteAttestationQuote, expected_payload: &str) -> Result<bool> {
    if quote.report_data != expected_payload {
        return Ok(false);
    }
    let parsed = TdxQuote::parse(&quote.quote_bytes()?)?;
    let expected = report_data_digest(expected_payload.as_bytes(), quote.hash_algorithm)?;
    Ok(parsed.report_data == expected)
}

/// Build a structurally valid v4 quote carrying `report_data`.
///
/// The signature section is zero-filled; only useful for simulators and tests.
pub fn build_unsigned_quote(report_data: &[u8; REPORT_DATA_SIZE]) -> Vec<u8> {
    let mut quote = vec![0u8; HEADER_SIZE + BODY_SIZE_V4 + 4];
    quote[0..2].copy_from_slice(&4u16.to_le_bytes());
    quote[2..4].copy_from_slice(&2u16.to_le_bytes());
    quote[4..8].copy_from_slice(&TEE_TYPE_TDX.to_le_bytes());
    let start = HEADER_SIZE + REPORT_DATA_OFFSET;
    quote[start..start + REPORT_DATA_SIZE].copy_from_slice(report_data);
    quote
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::bytes_to_hex;

    fn quote_for(payload: &str, algorithm: TdxQuoteHashAlgorithm) -> RemoteAttestationQuote {
        let digest = report_data_digest(payload.as_bytes(), algorithm).unwrap();
        RemoteAttestationQuote {
            quote: bytes_to_hex(&build_unsigned_quote(&digest)),
            report_data: payload.to_string(),
            hash_algorithm: algorithm,
            timestamp: 0,
        }
    }

    #[test]
    fn test_parse_extracts_report_data() {
        let mut data = [0u8; REPORT_DATA_SIZE];
        data[0] = 0xde;
        data[63] = 0xad;
        let parsed = TdxQuote::parse(&build_unsigned_quote(&data)).unwrap();
        assert_eq!(parsed.version, 4);
        assert_eq!(parsed.tee_type, TEE_TYPE_TDX);
        assert_eq!(parsed.report_data, data);
    }

    #[test]
    fn test_parse_rejects_truncated_quote() {
        assert!(matches!(
            TdxQuote::parse(&[0u8; 100]),
            Err(TeeError::Attestation(_))
        ));
    }

    #[test]
    fn test_parse_rejects_non_tdx() {
        let mut raw = build_unsigned_quote(&[0u8; REPORT_DATA_SIZE]);
        raw[4] = 0x00;
        assert!(TdxQuote::parse(&raw).is_err());
    }

    #[test]
    fn test_sha256_digest_is_zero_padded() {
        let digest = report_data_digest(b"hello", TdxQuoteHashAlgorithm::Sha256).unwrap();
        assert_eq!(
            bytes_to_hex(&digest[..32]),
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
        assert!(digest[32..].iter().all(|b| *b == 0));
    }

    #[test]
    fn test_raw_digest_length_limit() {
        assert!(report_data_digest(&[1u8; 64], TdxQuoteHashAlgorithm::Raw).is_ok());
        assert!(matches!(
            report_data_digest(&[1u8; 65], TdxQuoteHashAlgorithm::Raw),
            Err(TeeError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_verify_report_binding() {
        let payload = r#"{"agentId":"agent-123","publicKey":"0xabc","subject":"evm"}"#;
        let quote = quote_for(payload, TdxQuoteHashAlgorithm::Sha512);
        assert!(verify_report_binding(&quote, payload).unwrap());

        let other = r#"{"agentId":"agent-999","publicKey":"0xabc","subject":"evm"}"#;
        assert!(!verify_report_binding(&quote, other).unwrap());

        let mut tampered = quote.clone();
        tampered.report_data = other.to_string();
        assert!(!verify_report_binding(&tampered, other).unwrap());
    }
}
