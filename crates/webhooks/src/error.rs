//! Error types for webhook verification.

use thiserror::Error;

/// Result type alias for webhook verification.
pub type Result<T> = std::result::Result<T, VerificationError>;

/// Reasons a webhook delivery is rejected. Every variant is fatal for that
/// delivery; a rejected webhook is never dispatched.
///
/// Messages name the failing step and never include key material, the
/// signature or the raw body.
#[derive(Debug, Error)]
pub enum VerificationError {
    /// The signature header is not a decodable compact JWS, or lacks a key id
    #[error("Malformed signature header: {0}")]
    MalformedHeader(String),

    /// The JOSE header names an algorithm other than ES256
    #[error("Unsupported signature algorithm '{0}'")]
    UnsupportedAlgorithm(String),

    /// No usable signing key exists for the key id, even after a refresh
    #[error("Unknown signing key '{0}'")]
    UnknownKey(String),

    /// The signing key could not be fetched from the provider
    #[error("Failed to fetch signing key: {0}")]
    KeyFetch(String),

    /// The signature does not verify under the resolved key
    #[error("Invalid webhook signature")]
    InvalidSignature,

    /// Issued-at is outside the freshness window
    #[error("Stale webhook: issued {age_secs}s ago")]
    Stale { age_secs: i64 },

    /// The claimed body hash does not match the raw body
    #[error("Webhook body hash mismatch")]
    HashMismatch,

    /// The verified body lacks the fields needed for dispatch
    #[error("Malformed webhook payload: {0}")]
    MalformedPayload(String),
}

impl VerificationError {
    pub fn malformed_header(message: impl Into<String>) -> Self {
        Self::MalformedHeader(message.into())
    }

    pub fn malformed_payload(message: impl Into<String>) -> Self {
        Self::MalformedPayload(message.into())
    }

    /// Short machine-readable reason for rejection logs.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::MalformedHeader(_) => "malformed_header",
            Self::UnsupportedAlgorithm(_) => "unsupported_algorithm",
            Self::UnknownKey(_) => "unknown_key",
            Self::KeyFetch(_) => "key_fetch",
            Self::InvalidSignature => "invalid_signature",
            Self::Stale { .. } => "stale",
            Self::HashMismatch => "hash_mismatch",
            Self::MalformedPayload(_) => "malformed_payload",
        }
    }
}

/// Failure of the combined verify-and-dispatch step.
#[derive(Debug, Error)]
pub enum WebhookError {
    #[error(transparent)]
    Verification(#[from] VerificationError),

    /// The webhook was valid but its sync could not be scheduled
    #[error("Failed to schedule sync: {0}")]
    Trigger(#[from] finlink_core::Error),
}
