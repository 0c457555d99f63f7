//! Error types for TEE operations.

#![allow(missing_docs)]

use thiserror::Error;

pub type Result<T> = std::result::Result<T, TeeError>;

#[derive(Debug, Error)]
pub enum TeeError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid TEE_MODE: {0}. Must be one of: LOCAL, DOCKER, PRODUCTION, OFF")]
    InvalidMode(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Failed to generate attestation: {0}")]
    Attestation(String),

    #[error("Cryptographic error: {0}")]
    Crypto(String),

    #[error("Operation cancelled: {0}")]
    Cancelled(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Hex decoding error: {0}")]
    HexDecode(#[from] hex::FromHexError),
}

/// Coarse error classification callers can branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Invalid or missing mode/salt/endpoint at setup time.
    Configuration,
    /// Caller passed an empty path or subject (or oversized raw report data).
    InvalidArgument,
    /// The TEE endpoint was unreachable, timed out, or answered with garbage.
    Transport,
    /// Quote generation failed after key derivation succeeded.
    Attestation,
    /// Key construction from derived material failed.
    Crypto,
    /// The caller cancelled the operation.
    Cancelled,
    /// Local serialization failure.
    Encoding,
}

impl TeeError {
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    pub fn invalid_argument<S: Into<String>>(msg: S) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub fn transport<S: Into<String>>(msg: S) -> Self {
        Self::Transport(msg.into())
    }

    pub fn attestation<S: Into<String>>(msg: S) -> Self {
        Self::Attestation(msg.into())
    }

    pub fn crypto<S: Into<String>>(msg: S) -> Self {
        Self::Crypto(msg.into())
    }

    pub fn cancelled<S: Into<String>>(msg: S) -> Self {
        Self::Cancelled(msg.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Config(_) | Self::InvalidMode(_) => ErrorKind::Configuration,
            Self::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Self::Transport(_) => ErrorKind::Transport,
            Self::Attestation(_) => ErrorKind::Attestation,
            Self::Crypto(_) => ErrorKind::Crypto,
            Self::Cancelled(_) => ErrorKind::Cancelled,
            Self::Json(_) | Self::HexDecode(_) => ErrorKind::Encoding,
        }
    }

    /// Only transport failures are retried; both TEE RPCs are side-effect free.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

impl From<reqwest::Error> for TeeError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Transport(format!("request timed out: {}", err))
        } else if err.is_decode() {
            Self::Transport(format!("malformed response: {}", err))
        } else {
            Self::Transport(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_classification() {
        assert_eq!(TeeError::InvalidMode("X".into()).kind(), ErrorKind::Configuration);
        assert_eq!(TeeError::config("x").kind(), ErrorKind::Configuration);
        assert_eq!(TeeError::invalid_argument("x").kind(), ErrorKind::InvalidArgument);
        assert_eq!(TeeError::transport("x").kind(), ErrorKind::Transport);
        assert_eq!(TeeError::attestation("x").kind(), ErrorKind::Attestation);
        assert_eq!(TeeError::cancelled("x").kind(), ErrorKind::Cancelled);
    }

    #[test]
    fn test_only_transport_is_retryable() {
        assert!(TeeError::transport("connection refused").is_retryable());
        assert!(!TeeError::attestation("quote failed").is_retryable());
        assert!(!TeeError::invalid_argument("empty path").is_retryable());
        assert!(!TeeError::config("bad mode").is_retryable());
        assert!(!TeeError::cancelled("derive_key").is_retryable());
    }
}
