//! Key Derivation Provider for Phala TEE.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::client::{TeeClient, TeeTransport};
use crate::config::{CallPolicy, TeeServiceConfig};
use crate::error::Result;
use crate::keys::{Ed25519Keypair, EvmAccount};
use crate::providers::base::{DeriveKeyProvider, RemoteAttestationProvider};
use crate::providers::remote_attestation::PhalaRemoteAttestationProvider;
use crate::retry::run_with_policy;
use crate::types::{
    ChainIdentities, DerivationRequest, DeriveKeyAttestationData, DeriveKeyResult,
    EcdsaKeypairResult, Ed25519Generation, Ed25519KeypairResult, RemoteAttestationQuote, TeeMode,
};
use crate::utils::{calculate_keccak256, calculate_sha256};

/// Phala Network Key Derivation Provider.
///
/// Derives cryptographic keys within the TEE using Phala's DStack API and
/// binds every derived public identity to the requesting agent with a fresh
/// attestation quote. A keypair is never returned without its quote.
pub struct PhalaDeriveKeyProvider {
    transport: Arc<dyn TeeTransport>,
    ra_provider: PhalaRemoteAttestationProvider,
    policy: CallPolicy,
    ed25519_generation: Ed25519Generation,
}

impl PhalaDeriveKeyProvider {
    /// Create a new Phala key derivation provider.
    ///
    /// # Arguments
    ///
    /// * `tee_mode` - The TEE operation mode (LOCAL, DOCKER, PRODUCTION).
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the mode is invalid or OFF. No
    /// network traffic happens before this check.
    pub fn new(tee_mode: &str) -> Result<Self> {
        let config = TeeServiceConfig {
            mode: TeeMode::parse(tee_mode)?,
            ..TeeServiceConfig::default()
        };
        Self::from_config(&config)
    }

    /// Build from service configuration, using an HTTP transport.
    pub fn from_config(config: &TeeServiceConfig) -> Result<Self> {
        let client = TeeClient::from_config(config)?;
        info!("TEE: Key derivation service at {}", client.endpoint());
        Ok(Self::with_transport(Arc::new(client), config.call_policy())
            .with_ed25519_generation(config.ed25519_generation))
    }

    /// Build on an existing transport; attestation shares it.
    pub fn with_transport(transport: Arc<dyn TeeTransport>, policy: CallPolicy) -> Self {
        Self {
            ra_provider: PhalaRemoteAttestationProvider::with_transport(
                Arc::clone(&transport),
                policy.clone(),
            ),
            transport,
            policy,
            ed25519_generation: Ed25519Generation::default(),
        }
    }

    /// Choose how Ed25519 keypairs are produced.
    #[must_use]
    pub fn with_ed25519_generation(mut self, generation: Ed25519Generation) -> Self {
        self.ed25519_generation = generation;
        self
    }

    /// Strategy used for Ed25519 keypairs.
    pub fn ed25519_generation(&self) -> Ed25519Generation {
        self.ed25519_generation
    }

    async fn derive(
        &self,
        request: &DerivationRequest,
        cancel: &CancellationToken,
    ) -> Result<DeriveKeyResult> {
        let transport = &self.transport;
        let (path, subject) = (request.path(), request.subject());
        run_with_policy(
            move || transport.derive_key(path, subject),
            &self.policy,
            cancel,
            "derive_key",
        )
        .await
    }

    /// Generate attestation for derived key.
    async fn generate_derive_key_attestation(
        &self,
        agent_id: &str,
        public_key: &str,
        subject: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<RemoteAttestationQuote> {
        let report_data =
            DeriveKeyAttestationData::new(agent_id, public_key, subject).to_report_data()?;

        debug!("Generating attestation for derived key...");
        let quote = self
            .ra_provider
            .generate_attestation_with_cancel(&report_data, None, cancel)
            .await?;
        info!("Key derivation attestation generated successfully");
        Ok(quote)
    }

    /// Derive an Ed25519 keypair (for Solana).
    ///
    /// # Arguments
    ///
    /// * `path` - The derivation path.
    /// * `subject` - The subject for the certificate chain.
    /// * `agent_id` - The agent ID for attestation.
    ///
    /// # Returns
    ///
    /// The keypair result with public key, signing key, and attestation.
    pub async fn derive_ed25519_keypair(
        &self,
        path: &str,
        subject: &str,
        agent_id: &str,
    ) -> Result<Ed25519KeypairResult> {
        self.derive_ed25519_keypair_with_cancel(path, subject, agent_id, &CancellationToken::new())
            .await
    }

    /// As [`derive_ed25519_keypair`](Self::derive_ed25519_keypair) with cancellation.
    pub async fn derive_ed25519_keypair_with_cancel(
        &self,
        path: &str,
        subject: &str,
        agent_id: &str,
        cancel: &CancellationToken,
    ) -> Result<Ed25519KeypairResult> {
        let request = DerivationRequest::new(path, subject)?;

        debug!("Deriving Ed25519 key in TEE...");
        let derived = self.derive(&request, cancel).await?;

        let keypair = match self.ed25519_generation {
            Ed25519Generation::Seeded => {
                Ed25519Keypair::from_seed(&calculate_sha256(derived.key.as_bytes()))
            }
            Ed25519Generation::Random => Ed25519Keypair::generate(),
        };
        drop(derived);
        let public_key = keypair.public_key_base58();

        let attestation = self
            .generate_derive_key_attestation(agent_id, &public_key, Some(subject), cancel)
            .await?;

        info!(
            "Ed25519 key derived successfully ({})",
            self.ed25519_generation.as_str()
        );

        Ok(Ed25519KeypairResult {
            public_key,
            keypair,
            generation: self.ed25519_generation,
            attestation,
        })
    }

    /// Derive an ECDSA keypair (for EVM).
    ///
    /// # Arguments
    ///
    /// * `path` - The derivation path.
    /// * `subject` - The subject for the certificate chain.
    /// * `agent_id` - The agent ID for attestation.
    ///
    /// # Returns
    ///
    /// The keypair result with address, account, and attestation.
    pub async fn derive_ecdsa_keypair(
        &self,
        path: &str,
        subject: &str,
        agent_id: &str,
    ) -> Result<EcdsaKeypairResult> {
        self.derive_ecdsa_keypair_with_cancel(path, subject, agent_id, &CancellationToken::new())
            .await
    }

    /// As [`derive_ecdsa_keypair`](Self::derive_ecdsa_keypair) with cancellation.
    pub async fn derive_ecdsa_keypair_with_cancel(
        &self,
        path: &str,
        subject: &str,
        agent_id: &str,
        cancel: &CancellationToken,
    ) -> Result<EcdsaKeypairResult> {
        let request = DerivationRequest::new(path, subject)?;

        debug!("Deriving ECDSA key in TEE...");
        let derived = self.derive(&request, cancel).await?;

        let account = EvmAccount::from_private_key(&calculate_keccak256(derived.key.as_bytes()))?;
        drop(derived);
        let address = account.address();

        let attestation = self
            .generate_derive_key_attestation(agent_id, &address, Some(subject), cancel)
            .await?;

        info!("ECDSA key derived successfully");

        Ok(EcdsaKeypairResult {
            address,
            account,
            attestation,
        })
    }

    /// Derive the public identity for every supported chain from one salt.
    ///
    /// Solana uses subject `"solana"`, EVM uses `"evm"`; both derivations run
    /// concurrently and the first failure fails the whole call.
    pub async fn derive_chain_identities(
        &self,
        secret_salt: &str,
        agent_id: &str,
        cancel: &CancellationToken,
    ) -> Result<ChainIdentities> {
        let (solana, evm) = futures::try_join!(
            self.derive_ed25519_keypair_with_cancel(
                secret_salt,
                ChainIdentities::SOLANA_SUBJECT,
                agent_id,
                cancel
            ),
            self.derive_ecdsa_keypair_with_cancel(
                secret_salt,
                ChainIdentities::EVM_SUBJECT,
                agent_id,
                cancel
            )
        )?;

        Ok(ChainIdentities {
            solana: solana.public_key,
            evm: evm.address,
        })
    }
}

#[async_trait]
impl DeriveKeyProvider for PhalaDeriveKeyProvider {
    async fn raw_derive_key_with_cancel(
        &self,
        path: &str,
        subject: &str,
        cancel: &CancellationToken,
    ) -> Result<DeriveKeyResult> {
        let request = DerivationRequest::new(path, subject)?;

        debug!("Deriving raw key in TEE...");
        let result = self.derive(&request, cancel).await?;

        info!("Raw key derived successfully");
        Ok(result)
    }
}
