//! Core types for TEE key derivation.
//!
//! All types are strongly typed with explicit field requirements.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{Result, TeeError};
use crate::keys::{Ed25519Keypair, EvmAccount};

/// Simulator address used in `LOCAL` mode.
pub const LOCAL_SIMULATOR_ENDPOINT: &str = "http://localhost:8090";

/// Simulator address used in `DOCKER` mode.
pub const DOCKER_SIMULATOR_ENDPOINT: &str = "http://host.docker.internal:8090";

/// TEE operation mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TeeMode {
    /// Local development with simulator at localhost:8090.
    Local,
    /// Docker development with simulator at host.docker.internal:8090.
    Docker,
    /// Production mode without simulator.
    Production,
    /// TEE disabled. Wallet loading falls back to configured keys.
    Off,
}

impl TeeMode {
    /// Get the string representation of the mode.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "LOCAL",
            Self::Docker => "DOCKER",
            Self::Production => "PRODUCTION",
            Self::Off => "OFF",
        }
    }

    /// Parse a mode from string.
    pub fn parse(s: &str) -> Result<Self> {
        match s.trim().to_uppercase().as_str() {
            "LOCAL" => Ok(Self::Local),
            "DOCKER" => Ok(Self::Docker),
            "PRODUCTION" => Ok(Self::Production),
            "OFF" => Ok(Self::Off),
            _ => Err(TeeError::InvalidMode(s.to_string())),
        }
    }

    /// Whether this mode talks to a TEE at all.
    pub fn is_enabled(&self) -> bool {
        !matches!(self, Self::Off)
    }

    /// Simulator endpoint for development modes; `None` for production and off.
    pub fn simulator_endpoint(&self) -> Option<&'static str> {
        match self {
            Self::Local => Some(LOCAL_SIMULATOR_ENDPOINT),
            Self::Docker => Some(DOCKER_SIMULATOR_ENDPOINT),
            Self::Production | Self::Off => None,
        }
    }
}

impl Default for TeeMode {
    fn default() -> Self {
        Self::Local
    }
}

impl fmt::Display for TeeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Hash algorithms supported for TDX quotes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TdxQuoteHashAlgorithm {
    /// SHA-256, zero-padded to 64 bytes.
    Sha256,
    /// SHA-384, zero-padded to 64 bytes.
    Sha384,
    /// SHA-512.
    #[default]
    Sha512,
    /// Report data is embedded as-is; must fit in 64 bytes.
    Raw,
}

impl TdxQuoteHashAlgorithm {
    /// Wire name of the algorithm.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sha256 => "sha256",
            Self::Sha384 => "sha384",
            Self::Sha512 => "sha512",
            Self::Raw => "raw",
        }
    }
}

/// A validated derivation address in the TEE's root-of-trust tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivationRequest {
    path: String,
    subject: String,
}

impl DerivationRequest {
    /// Both `path` and `subject` must be non-empty.
    pub fn new(path: impl Into<String>, subject: impl Into<String>) -> Result<Self> {
        let path = path.into();
        let subject = subject.into();
        if path.is_empty() || subject.is_empty() {
            return Err(TeeError::invalid_argument(
                "Path and subject are required for key derivation",
            ));
        }
        Ok(Self { path, subject })
    }

    /// Derivation path.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Derivation subject.
    pub fn subject(&self) -> &str {
        &self.subject
    }
}

/// Key material returned by the TEE. Wiped on drop and never printed.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct RawDerivedKey(Vec<u8>);

impl RawDerivedKey {
    /// Take ownership of raw key bytes.
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// Borrow the raw key bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Length in bytes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the key is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for RawDerivedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RawDerivedKey([REDACTED; {} bytes])", self.0.len())
    }
}

/// Remote attestation quote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteAttestationQuote {
    /// The attestation quote (hex-encoded).
    pub quote: String,
    /// The exact payload that was bound into the quote.
    pub report_data: String,
    /// How `report_data` was reduced to the quote's 64-byte field.
    pub hash_algorithm: TdxQuoteHashAlgorithm,
    /// Timestamp when the quote was generated.
    pub timestamp: u64,
}

impl RemoteAttestationQuote {
    /// Decode the hex quote into raw bytes.
    pub fn quote_bytes(&self) -> Result<Vec<u8>> {
        crate::utils::hex_to_bytes(&self.quote)
    }
}

/// Data included in derive key attestation.
///
/// Field order is fixed so the serialized payload is canonical: verifiers
/// rebuild it from `{agentId, publicKey, subject}` and compare bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeriveKeyAttestationData {
    /// Agent ID that derived the key.
    pub agent_id: String,
    /// Public key (base58) or address (0x-prefixed) derived.
    pub public_key: String,
    /// Subject used for derivation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
}

impl DeriveKeyAttestationData {
    /// Bind `public_key` to `agent_id`, optionally scoped to `subject`.
    pub fn new(agent_id: &str, public_key: &str, subject: Option<&str>) -> Self {
        Self {
            agent_id: agent_id.to_string(),
            public_key: public_key.to_string(),
            subject: subject.map(str::to_string),
        }
    }

    /// Compact JSON with fixed key order.
    pub fn to_report_data(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Whether `quote` was requested for exactly this data.
    pub fn matches(&self, quote: &RemoteAttestationQuote) -> Result<bool> {
        Ok(self.to_report_data()? == quote.report_data)
    }
}

/// Result of key derivation.
#[derive(Debug, Clone)]
pub struct DeriveKeyResult {
    /// The derived key.
    pub key: RawDerivedKey,
    /// Certificate chain for verification.
    pub certificate_chain: Vec<String>,
}

/// How Ed25519 keypairs are produced from the derived seed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Ed25519Generation {
    /// Keypair is a pure function of SHA-256(raw derived key).
    #[default]
    Seeded,
    /// Keypair is drawn from the OS RNG; the derived seed is discarded and
    /// repeated calls yield different keys.
    Random,
}

impl Ed25519Generation {
    /// Lowercase setting value.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Seeded => "seeded",
            Self::Random => "random",
        }
    }

    /// Parse `seeded` or `random`, ignoring case.
    pub fn parse(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "seeded" => Ok(Self::Seeded),
            "random" => Ok(Self::Random),
            _ => Err(TeeError::config(format!(
                "Invalid Ed25519 generation strategy: {}. Must be one of: seeded, random",
                s
            ))),
        }
    }

    /// Whether the same derived key always yields the same keypair.
    pub fn is_deterministic(&self) -> bool {
        matches!(self, Self::Seeded)
    }
}

/// Ed25519 keypair result from TEE.
#[derive(Debug, Clone)]
pub struct Ed25519KeypairResult {
    /// The derived public key (base58 encoded).
    pub public_key: String,
    /// Signing capability.
    pub keypair: Ed25519Keypair,
    /// Strategy that produced `keypair`.
    pub generation: Ed25519Generation,
    /// Attestation quote for verification.
    pub attestation: RemoteAttestationQuote,
}

/// ECDSA (secp256k1) keypair result from TEE.
#[derive(Debug, Clone)]
pub struct EcdsaKeypairResult {
    /// The derived address (EIP-55 checksummed, 0x prefixed).
    pub address: String,
    /// Signing capability.
    pub account: EvmAccount,
    /// Attestation quote for verification.
    pub attestation: RemoteAttestationQuote,
}

/// Public identities derived for every supported chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainIdentities {
    /// Base58 Ed25519 public key.
    pub solana: String,
    /// Checksummed EVM address.
    pub evm: String,
}

impl ChainIdentities {
    /// Subject used when deriving the Solana key.
    pub const SOLANA_SUBJECT: &'static str = "solana";
    /// Subject used when deriving the EVM key.
    pub const EVM_SUBJECT: &'static str = "evm";

    /// Subject to identity map.
    pub fn to_map(&self) -> BTreeMap<String, String> {
        BTreeMap::from([
            (Self::SOLANA_SUBJECT.to_string(), self.solana.clone()),
            (Self::EVM_SUBJECT.to_string(), self.evm.clone()),
        ])
    }

    /// Compact JSON object keyed by subject.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_tee_mode_parse() {
        assert_eq!(TeeMode::parse("LOCAL").unwrap(), TeeMode::Local);
        assert_eq!(TeeMode::parse("local").unwrap(), TeeMode::Local);
        assert_eq!(TeeMode::parse("DOCKER").unwrap(), TeeMode::Docker);
        assert_eq!(TeeMode::parse("PRODUCTION").unwrap(), TeeMode::Production);
        assert_eq!(TeeMode::parse("off").unwrap(), TeeMode::Off);
        assert!(matches!(
            TeeMode::parse("INVALID"),
            Err(TeeError::InvalidMode(m)) if m == "INVALID"
        ));
    }

    #[test]
    fn test_derivation_request_requires_path_and_subject() {
        assert!(DerivationRequest::new("salt", "evm").is_ok());
        assert!(matches!(
            DerivationRequest::new("", "evm"),
            Err(TeeError::InvalidArgument(_))
        ));
        assert!(matches!(
            DerivationRequest::new("salt", ""),
            Err(TeeError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_raw_key_debug_is_redacted() {
        let key = RawDerivedKey::new(vec![0xAA; 32]);
        let rendered = format!("{:?}", key);
        assert_eq!(rendered, "RawDerivedKey([REDACTED; 32 bytes])");
    }

    #[test]
    fn test_report_data_is_canonical() {
        let data = DeriveKeyAttestationData::new("agent-123", "0xabc", Some("evm"));
        assert_eq!(
            data.to_report_data().unwrap(),
            r#"{"agentId":"agent-123","publicKey":"0xabc","subject":"evm"}"#
        );

        let without_subject = DeriveKeyAttestationData::new("agent-123", "0xabc", None);
        assert_eq!(
            without_subject.to_report_data().unwrap(),
            r#"{"agentId":"agent-123","publicKey":"0xabc"}"#
        );
    }

    #[test]
    fn test_chain_identities_json() {
        let ids = ChainIdentities {
            solana: "So1".to_string(),
            evm: "0xE".to_string(),
        };
        assert_eq!(ids.to_json().unwrap(), r#"{"solana":"So1","evm":"0xE"}"#);
        assert_eq!(ids.to_map().get("evm").map(String::as_str), Some("0xE"));
    }

    #[test]
    fn test_ed25519_generation_parse() {
        assert_eq!(Ed25519Generation::parse("Seeded").unwrap(), Ed25519Generation::Seeded);
        assert_eq!(Ed25519Generation::parse("random").unwrap(), Ed25519Generation::Random);
        assert!(Ed25519Generation::parse("sometimes").is_err());
        assert!(Ed25519Generation::default().is_deterministic());
    }
}
