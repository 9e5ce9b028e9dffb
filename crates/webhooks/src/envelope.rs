//! Verified webhook envelope.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

use crate::error::{Result, VerificationError};

/// A webhook that passed signature, freshness and body hash checks.
///
/// `raw_body` holds the exact bytes that were hashed. It is never
/// re-serialized.
#[derive(Debug, Clone)]
pub struct WebhookEnvelope {
    pub webhook_type: String,
    pub webhook_code: String,
    /// Absent for webhooks that are not about a single item.
    pub item_id: Option<String>,
    pub issued_at: DateTime<Utc>,
    /// Hex SHA-256 of the body, as claimed by the signed token.
    pub body_sha256: String,
    pub key_id: String,
    pub signature_header: String,
    pub raw_body: Bytes,
    /// Parsed body, kept for diagnostics.
    pub payload: Value,
}

/// Dispatch fields every webhook body carries.
#[derive(Debug, Deserialize)]
struct WebhookBody {
    webhook_type: String,
    webhook_code: String,
    #[serde(default)]
    item_id: Option<String>,
}

/// Routing fields decoded from a verified raw body.
#[derive(Debug)]
pub(crate) struct ParsedBody {
    pub webhook_type: String,
    pub webhook_code: String,
    pub item_id: Option<String>,
    pub payload: Value,
}

pub(crate) fn parse_body(raw_body: &[u8]) -> Result<ParsedBody> {
    let payload: Value = serde_json::from_slice(raw_body).map_err(|e| {
        VerificationError::malformed_payload(format!(
            "body is not JSON ({:?} at line {} column {})",
            e.classify(),
            e.line(),
            e.column()
        ))
    })?;

    let body = WebhookBody::deserialize(&payload).map_err(|_| {
        VerificationError::malformed_payload("missing webhook_type or webhook_code")
    })?;

    Ok(ParsedBody {
        webhook_type: body.webhook_type,
        webhook_code: body.webhook_code,
        item_id: body.item_id.filter(|id| !id.is_empty()),
        payload,
    })
}
