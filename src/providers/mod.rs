//! Key derivation and remote attestation providers.

pub mod base;
pub mod derive_key;
pub mod remote_attestation;

pub use base::{DeriveKeyProvider, RemoteAttestationProvider};
pub use derive_key::PhalaDeriveKeyProvider;
pub use remote_attestation::PhalaRemoteAttestationProvider;
