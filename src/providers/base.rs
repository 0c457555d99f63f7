//! Provider seams between key derivation, attestation and the transport.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::types::{DeriveKeyResult, RemoteAttestationQuote, TdxQuoteHashAlgorithm};

/// Source of raw key material rooted in the TEE.
#[async_trait]
pub trait DeriveKeyProvider: Send + Sync {
    /// Derive raw key material for `(path, subject)`.
    async fn raw_derive_key(&self, path: &str, subject: &str) -> Result<DeriveKeyResult> {
        self.raw_derive_key_with_cancel(path, subject, &CancellationToken::new())
            .await
    }

    /// As [`raw_derive_key`](Self::raw_derive_key), abandoning the call once
    /// `cancel` fires.
    async fn raw_derive_key_with_cancel(
        &self,
        path: &str,
        subject: &str,
        cancel: &CancellationToken,
    ) -> Result<DeriveKeyResult>;
}

/// Binds arbitrary report data into a hardware quote.
#[async_trait]
pub trait RemoteAttestationProvider: Send + Sync {
    /// Generate a quote over `report_data`. `None` selects the default hash.
    async fn generate_attestation(
        &self,
        report_data: &str,
        hash_algorithm: Option<TdxQuoteHashAlgorithm>,
    ) -> Result<RemoteAttestationQuote> {
        self.generate_attestation_with_cancel(report_data, hash_algorithm, &CancellationToken::new())
            .await
    }

    /// As [`generate_attestation`](Self::generate_attestation), abandoning the call once `cancel` fires.
    async fn generate_attestation_with_cancel(
        &self,
        report_data: &str,
        hash_algorithm: Option<TdxQuoteHashAlgorithm>,
        cancel: &CancellationToken,
    ) -> Result<RemoteAttestationQuote>;
}
