//! TEE key derivation service.

#![allow(missing_docs)]

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::client::TeeTransport;
use crate::config::TeeServiceConfig;
use crate::error::{Result, TeeError};
use crate::providers::derive_key::PhalaDeriveKeyProvider;
use crate::providers::DeriveKeyProvider;
use crate::types::{
    ChainIdentities, DeriveKeyResult, EcdsaKeypairResult, Ed25519KeypairResult, TeeMode,
};

pub struct TEEService {
    provider: PhalaDeriveKeyProvider,
    pub config: TeeServiceConfig,
}

impl TEEService {
    pub fn new(config: TeeServiceConfig) -> Result<Self> {
        Self::ensure_enabled(&config)?;
        let provider = PhalaDeriveKeyProvider::from_config(&config)?;

        info!("TEE service initialized with mode: {}", config.mode);

        Ok(Self { provider, config })
    }

    /// Build the service on a caller-supplied transport.
    pub fn with_transport(config: TeeServiceConfig, transport: Arc<dyn TeeTransport>) -> Result<Self> {
        Self::ensure_enabled(&config)?;
        let provider = PhalaDeriveKeyProvider::with_transport(transport, config.call_policy())
            .with_ed25519_generation(config.ed25519_generation);

        info!("TEE service initialized with mode: {} (custom transport)", config.mode);

        Ok(Self { provider, config })
    }

    /// Start from explicit settings. A missing mode means `OFF`, and an
    /// enabled mode without a salt is rejected before any client is built.
    pub fn start(tee_mode: Option<&str>, secret_salt: Option<String>) -> Result<Self> {
        let mode = match tee_mode {
            Some(m) => TeeMode::parse(m)?,
            None => TeeMode::Off,
        };

        info!("Starting TEE service with mode: {}", mode);

        Self::from_settings(TeeServiceConfig {
            mode,
            secret_salt,
            ..TeeServiceConfig::default()
        })
    }

    /// Start from `TEE_*` and `WALLET_SECRET_SALT` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_settings(TeeServiceConfig::from_env()?)
    }

    /// Start from an arbitrary settings source, with the same checks as
    /// [`TEEService::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        Self::from_settings(TeeServiceConfig::from_lookup(lookup)?)
    }

    fn from_settings(config: TeeServiceConfig) -> Result<Self> {
        Self::ensure_enabled(&config)?;
        config.require_secret_salt()?;
        Self::new(config)
    }

    pub fn stop(&self) {
        info!("Stopping TEE service");
    }

    fn ensure_enabled(config: &TeeServiceConfig) -> Result<()> {
        if config.mode.is_enabled() {
            Ok(())
        } else {
            Err(TeeError::config(
                "TEE_MODE is OFF; the TEE service cannot be started",
            ))
        }
    }

    pub const SERVICE_TYPE: &'static str = "tee";
    pub const CAPABILITY_DESCRIPTION: &'static str =
        "Trusted Execution Environment for secure key management";

    pub async fn derive_ecdsa_keypair(
        &self,
        path: &str,
        subject: &str,
        agent_id: &str,
    ) -> Result<EcdsaKeypairResult> {
        self.provider
            .derive_ecdsa_keypair(path, subject, agent_id)
            .await
    }

    pub async fn derive_ecdsa_keypair_with_cancel(
        &self,
        path: &str,
        subject: &str,
        agent_id: &str,
        cancel: &CancellationToken,
    ) -> Result<EcdsaKeypairResult> {
        self.provider
            .derive_ecdsa_keypair_with_cancel(path, subject, agent_id, cancel)
            .await
    }

    pub async fn derive_ed25519_keypair(
        &self,
        path: &str,
        subject: &str,
        agent_id: &str,
    ) -> Result<Ed25519KeypairResult> {
        self.provider
            .derive_ed25519_keypair(path, subject, agent_id)
            .await
    }

    pub async fn derive_ed25519_keypair_with_cancel(
        &self,
        path: &str,
        subject: &str,
        agent_id: &str,
        cancel: &CancellationToken,
    ) -> Result<Ed25519KeypairResult> {
        self.provider
            .derive_ed25519_keypair_with_cancel(path, subject, agent_id, cancel)
            .await
    }

    pub async fn raw_derive_key(&self, path: &str, subject: &str) -> Result<DeriveKeyResult> {
        self.provider.raw_derive_key(path, subject).await
    }

    /// Public identities for every chain, derived from `WALLET_SECRET_SALT`.
    pub async fn chain_identities(&self, agent_id: &str) -> Result<ChainIdentities> {
        self.chain_identities_with_cancel(agent_id, &CancellationToken::new())
            .await
    }

    pub async fn chain_identities_with_cancel(
        &self,
        agent_id: &str,
        cancel: &CancellationToken,
    ) -> Result<ChainIdentities> {
        let salt = self.config.require_secret_salt()?;
        self.provider
            .derive_chain_identities(salt, agent_id, cancel)
            .await
    }
}
