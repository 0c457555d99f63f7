//! Remote Attestation Provider for Phala TEE.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::client::{TeeClient, TeeTransport};
use crate::config::{CallPolicy, TeeServiceConfig};
use crate::error::{Result, TeeError};
use crate::providers::base::RemoteAttestationProvider;
use crate::quote::REPORT_DATA_SIZE;
use crate::retry::run_with_policy;
use crate::types::{RemoteAttestationQuote, TdxQuoteHashAlgorithm, TeeMode};
use crate::utils::{current_timestamp_ms, preview};

/// Phala Network Remote Attestation Provider.
///
/// Generates TDX attestation quotes for proving TEE execution. Quotes are
/// produced fresh on every call and never cached.
pub struct PhalaRemoteAttestationProvider {
    transport: Arc<dyn TeeTransport>,
    policy: CallPolicy,
}

impl PhalaRemoteAttestationProvider {
    /// Create a new Phala remote attestation provider.
    ///
    /// # Arguments
    ///
    /// * `tee_mode` - The TEE operation mode (LOCAL, DOCKER, PRODUCTION).
    ///
    /// # Errors
    ///
    /// Returns an error if the mode is invalid or OFF.
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
        Ok(Self::with_transport(Arc::new(client), config.call_policy()))
    }

    /// Use an existing transport, e.g. one shared with key derivation.
    pub fn with_transport(transport: Arc<dyn TeeTransport>, policy: CallPolicy) -> Self {
        Self { transport, policy }
    }
}

#[async_trait]
impl RemoteAttestationProvider for PhalaRemoteAttestationProvider {
    async fn generate_attestation_with_cancel(
        &self,
        report_data: &str,
        hash_algorithm: Option<TdxQuoteHashAlgorithm>,
        cancel: &CancellationToken,
    ) -> Result<RemoteAttestationQuote> {
        debug!("Generating attestation for: {}...", preview(report_data, 100));

        let hash_algorithm = hash_algorithm.unwrap_or_default();
        if hash_algorithm == TdxQuoteHashAlgorithm::Raw && report_data.len() > REPORT_DATA_SIZE {
            return Err(TeeError::invalid_argument(format!(
                "raw report data is {} bytes, limit is {}",
                report_data.len(),
                REPORT_DATA_SIZE
            )));
        }
        let transport = &self.transport;

        let result = run_with_policy(
            move || transport.tdx_quote(report_data, hash_algorithm),
            &self.policy,
            cancel,
            "tdx_quote",
        )
        .await
        .map_err(|e| match e {
            TeeError::Cancelled(_) | TeeError::InvalidArgument(_) => e,
            other => TeeError::attestation(other.to_string()),
        })?;

        if !result.rtmrs.is_empty() {
            let rtmr = |i: usize| result.rtmrs.get(i).map(String::as_str).unwrap_or("N/A");
            debug!(
                "RTMR values: rtmr0={}, rtmr1={}, rtmr2={}, rtmr3={}",
                rtmr(0),
                rtmr(1),
                rtmr(2),
                rtmr(3),
            );
        }

        info!("Remote attestation quote generated successfully");

        Ok(RemoteAttestationQuote {
            quote: result.quote,
            report_data: report_data.to_string(),
            hash_algorithm,
            timestamp: current_timestamp_ms(),
        })
    }
}
