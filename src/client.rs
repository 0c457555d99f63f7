//! HTTP transport for the TEE derive-key and quote RPCs.

#![allow(missing_docs)]

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::{TeeServiceConfig, DEFAULT_REQUEST_TIMEOUT_MS};
use crate::error::{Result, TeeError};
use crate::types::{DeriveKeyResult, RawDerivedKey, TdxQuoteHashAlgorithm, TeeMode};

/// Endpoint used in production, where the hardware exposes the derive/report service.
pub const DEFAULT_PRODUCTION_ENDPOINT: &str = "https://api.phala.network/tee";

/// The two RPCs a TEE exposes to this crate.
///
/// Both are side-effect free, so callers may retry them.
#[async_trait]
pub trait TeeTransport: Send + Sync {
    async fn derive_key(&self, path: &str, subject: &str) -> Result<DeriveKeyResult>;

    async fn tdx_quote(
        &self,
        report_data: &str,
        hash_algorithm: TdxQuoteHashAlgorithm,
    ) -> Result<TdxQuoteResponse>;
}

#[derive(Debug, Clone)]
pub struct TeeClient {
    client: Client,
    endpoint: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeriveKeyResponse {
    pub key: String,
    #[serde(default, alias = "certificate_chain")]
    pub certificate_chain: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TdxQuoteResponse {
    pub quote: String,
    #[serde(default)]
    pub rtmrs: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct DeriveKeyRequest<'a> {
    pub path: &'a str,
    pub subject: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TdxQuoteRequest<'a> {
    pub report_data: &'a str,
    pub hash_algorithm: &'static str,
}

impl TeeClient {
    /// Client for `mode`, optionally pointed at an explicit endpoint.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for `OFF` or if the HTTP client cannot be built.
    pub fn new(mode: TeeMode, endpoint: Option<String>, timeout: Duration) -> Result<Self> {
        if !mode.is_enabled() {
            return Err(TeeError::config(
                "TEE_MODE is OFF; a TEE client cannot be constructed",
            ));
        }

        let endpoint = match endpoint {
            Some(ep) => ep,
            None => mode
                .simulator_endpoint()
                .unwrap_or(DEFAULT_PRODUCTION_ENDPOINT)
                .to_string(),
        };
        let endpoint = endpoint.trim_end_matches('/').to_string();

        match mode {
            TeeMode::Production => info!("TEE: Running in production mode at {}", endpoint),
            _ => info!("TEE: Connecting to simulator at {}", endpoint),
        }

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TeeError::config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, endpoint })
    }

    /// Parse `tee_mode` and build a client with default settings.
    pub fn from_mode(tee_mode: &str) -> Result<Self> {
        let mode = TeeMode::parse(tee_mode)?;
        Self::new(mode, None, Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS))
    }

    pub fn from_config(config: &TeeServiceConfig) -> Result<Self> {
        Self::new(config.mode, config.endpoint.clone(), config.request_timeout)
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn post<Req: Serialize + ?Sized>(&self, route: &str, body: &Req) -> Result<reqwest::Response> {
        let response = self
            .client
            .post(format!("{}/{}", self.endpoint, route))
            .json(body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(TeeError::transport(format!(
                "{} failed: {} - {}",
                route, status, body
            )));
        }
        Ok(response)
    }
}

#[async_trait]
impl TeeTransport for TeeClient {
    async fn derive_key(&self, path: &str, subject: &str) -> Result<DeriveKeyResult> {
        let response = self
            .post("derive-key", &DeriveKeyRequest { path, subject })
            .await?;
        let result: DeriveKeyResponse = response.json().await?;

        let key = hex::decode(result.key.trim().trim_start_matches("0x"))
            .map_err(|e| TeeError::transport(format!("malformed derived key: {}", e)))?;
        if key.is_empty() {
            return Err(TeeError::transport("malformed derived key: empty"));
        }

        Ok(DeriveKeyResult {
            key: RawDerivedKey::new(key),
            certificate_chain: result.certificate_chain,
        })
    }

    async fn tdx_quote(
        &self,
        report_data: &str,
        hash_algorithm: TdxQuoteHashAlgorithm,
    ) -> Result<TdxQuoteResponse> {
        let request = TdxQuoteRequest {
            report_data,
            hash_algorithm: hash_algorithm.as_str(),
        };
        let response = self.post("tdx-quote", &request).await?;
        let result: TdxQuoteResponse = response.json().await?;

        if result.quote.trim().is_empty() {
            return Err(TeeError::transport("malformed quote: empty"));
        }
        Ok(result)
    }
}
