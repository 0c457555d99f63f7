//! elizaOS TEE key derivation
//!
//! Derives deterministic Ed25519 (Solana) and secp256k1 (EVM) keys inside a
//! Trusted Execution Environment and binds each derived public identity to
//! the requesting agent with a remote attestation quote.
//!
//! # Example
//!
//! ```rust,ignore
//! use elizaos_tee_derive::TEEService;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let service = TEEService::start(Some("LOCAL"), Some("my-salt".to_string()))?;
//!
//!     // Derive Ed25519 keypair (for Solana)
//!     let solana_result = service
//!         .derive_ed25519_keypair("my-salt", "solana", "agent-123")
//!         .await?;
//!     println!("Solana Public Key: {}", solana_result.public_key);
//!
//!     // Derive ECDSA keypair (for EVM)
//!     let evm_result = service
//!         .derive_ecdsa_keypair("my-salt", "evm", "agent-123")
//!         .await?;
//!     println!("EVM Address: {}", evm_result.address);
//!
//!     // Both identities at once
//!     let ids = service.chain_identities("agent-123").await?;
//!     println!("{}", ids.to_json()?);
//!
//!     service.stop();
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod client;
pub mod config;
pub mod error;
pub mod keys;
pub mod providers;
pub mod quote;
pub mod retry;
pub mod services;
pub mod types;
pub mod utils;

// Re-export main types
pub use client::{TeeClient, TeeTransport, TdxQuoteResponse, DEFAULT_PRODUCTION_ENDPOINT};
pub use config::{CallPolicy, RetryConfig, TeeServiceConfig};
pub use error::{ErrorKind, Result, TeeError};
pub use keys::{Ed25519Keypair, EvmAccount};
pub use providers::{
    DeriveKeyProvider, PhalaDeriveKeyProvider, PhalaRemoteAttestationProvider,
    RemoteAttestationProvider,
};
pub use quote::{report_data_digest, verify_report_binding, TdxQuote};
pub use services::TEEService;
pub use tokio_util::sync::CancellationToken;
pub use types::{
    ChainIdentities, DerivationRequest, DeriveKeyAttestationData, DeriveKeyResult,
    EcdsaKeypairResult, Ed25519Generation, Ed25519KeypairResult, RawDerivedKey,
    RemoteAttestationQuote, TdxQuoteHashAlgorithm, TeeMode,
};
pub use utils::{
    bytes_to_hex, calculate_keccak256, calculate_sha256, get_tee_endpoint, hex_to_bytes,
    to_checksum_address,
};

/// Crate name as registered with the agent runtime.
pub const PLUGIN_NAME: &str = "tee-derive";

/// Crate description.
pub const PLUGIN_DESCRIPTION: &str =
    "TEE-backed deterministic key derivation with remote attestation";

/// Crate version.
pub const PLUGIN_VERSION: &str = env!("CARGO_PKG_VERSION");
