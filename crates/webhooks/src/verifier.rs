//! Webhook authenticity verification.
//!
//! The provider signs every delivery with a compact JWS carried in the
//! `Plaid-Verification` header. Its claims hold the issue time and the hex
//! SHA-256 of the body. A delivery is accepted only when:
//!
//! 1. the JOSE header names ES256 and a key id,
//! 2. the token was issued within the freshness window,
//! 3. the signature verifies under the provider's key for that id,
//! 4. the claimed body hash matches the raw body in constant time.
//!
//! Freshness is checked before the key is resolved, so a stale delivery is
//! rejected as stale whatever its signature, and never causes a key fetch.

use std::sync::Arc;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use bytes::Bytes;
use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, decode_header, Algorithm, Validation};
use log::{debug, warn};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use finlink_core::constants::WEBHOOK_FRESHNESS_WINDOW_SECS;
use finlink_plaid::AggregatorApi;

use crate::envelope::{parse_body, WebhookEnvelope};
use crate::error::{Result, VerificationError};
use crate::keys::SigningKeyCache;

/// Verifier settings.
#[derive(Debug, Clone)]
pub struct VerifierConfig {
    /// Maximum age of a signed token.
    pub freshness_window: Duration,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            freshness_window: Duration::seconds(WEBHOOK_FRESHNESS_WINDOW_SECS),
        }
    }
}

#[derive(Debug, Deserialize)]
struct Claims {
    iat: i64,
    request_body_sha256: String,
}

#[derive(Deserialize)]
struct IssuedAt {
    iat: i64,
}

/// ES256 only. The provider's tokens carry no `exp`, freshness is enforced on
/// `iat` instead.
pub(crate) fn es256_validation() -> Validation {
    let mut validation = Validation::new(Algorithm::ES256);
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();
    validation
}

/// `iat` from the claims segment before the signature is checked. Only used to
/// turn stale deliveries away without a key lookup.
fn unverified_issued_at(token: &str) -> Result<i64> {
    let malformed = || VerificationError::malformed_header("claims are not readable");
    let segment = token.split('.').nth(1).ok_or_else(malformed)?;
    let bytes = URL_SAFE_NO_PAD.decode(segment).map_err(|_| malformed())?;
    serde_json::from_slice::<IssuedAt>(&bytes)
        .map(|claims| claims.iat)
        .map_err(|_| malformed())
}

/// Read the key id from the JOSE header, refusing anything but ES256.
fn signing_key_id(token: &str) -> Result<String> {
    let header = decode_header(token)
        .map_err(|e| VerificationError::malformed_header(format!("header: {}", e)))?;
    if header.alg != Algorithm::ES256 {
        return Err(VerificationError::UnsupportedAlgorithm(format!(
            "{:?}",
            header.alg
        )));
    }
    header
        .kid
        .filter(|kid| !kid.is_empty())
        .ok_or_else(|| VerificationError::malformed_header("missing kid"))
}

fn decode_error(e: jsonwebtoken::errors::Error) -> VerificationError {
    match e.kind() {
        ErrorKind::InvalidAlgorithm => VerificationError::UnsupportedAlgorithm(e.to_string()),
        ErrorKind::Base64(_) | ErrorKind::Json(_) | ErrorKind::Utf8(_) => {
            VerificationError::malformed_header(e.to_string())
        }
        _ => VerificationError::InvalidSignature,
    }
}

/// Verifies webhook deliveries against the provider's signing keys.
pub struct WebhookVerifier {
    keys: SigningKeyCache,
    config: VerifierConfig,
}

impl WebhookVerifier {
    pub fn new(key_source: Arc<dyn AggregatorApi>) -> Self {
        Self::with_config(key_source, VerifierConfig::default())
    }

    pub fn with_config(key_source: Arc<dyn AggregatorApi>, config: VerifierConfig) -> Self {
        Self {
            keys: SigningKeyCache::new(key_source),
            config,
        }
    }

    /// Verify a delivery against the current time.
    pub async fn verify(&self, raw_body: Bytes, signature_header: &str) -> Result<WebhookEnvelope> {
        self.verify_at(raw_body, signature_header, Utc::now()).await
    }

    /// Verify a delivery as of `now`.
    ///
    /// # Errors
    ///
    /// Returns the [`VerificationError`] of the first failing check. Every
    /// rejection is logged with the key id, the reason and the body length.
    pub async fn verify_at(
        &self,
        raw_body: Bytes,
        signature_header: &str,
        now: DateTime<Utc>,
    ) -> Result<WebhookEnvelope> {
        let token = signature_header.trim();
        let key_id = match signing_key_id(token) {
            Ok(kid) => kid,
            Err(e) => {
                warn!(
                    "[Webhooks] Rejected webhook (kid=-, reason={}, body_len={}): {}",
                    e.reason(),
                    raw_body.len(),
                    e
                );
                return Err(e);
            }
        };

        self.check(token, &key_id, raw_body.clone(), now)
            .await
            .map_err(|e| {
                warn!(
                    "[Webhooks] Rejected webhook (kid={}, reason={}, body_len={}): {}",
                    key_id,
                    e.reason(),
                    raw_body.len(),
                    e
                );
                e
            })
    }

    async fn check(
        &self,
        token: &str,
        key_id: &str,
        raw_body: Bytes,
        now: DateTime<Utc>,
    ) -> Result<WebhookEnvelope> {
        let age_secs = now.timestamp().saturating_sub(unverified_issued_at(token)?);
        if age_secs > self.config.freshness_window.num_seconds() {
            return Err(VerificationError::Stale { age_secs });
        }

        let key = self.keys.resolve(key_id, now).await?;
        let claims = decode::<Claims>(token, &key, &es256_validation())
            .map_err(decode_error)?
            .claims;
        let issued_at = Utc
            .timestamp_opt(claims.iat, 0)
            .single()
            .ok_or_else(|| VerificationError::malformed_header("iat out of range"))?;

        let actual_sha256 = hex::encode(Sha256::digest(&raw_body));
        let claimed = claims.request_body_sha256.to_ascii_lowercase();
        if !bool::from(claimed.as_bytes().ct_eq(actual_sha256.as_bytes())) {
            return Err(VerificationError::HashMismatch);
        }

        let body = parse_body(&raw_body)?;
        debug!(
            "[Webhooks] Verified {}/{} webhook (kid={}, age={}s)",
            body.webhook_type, body.webhook_code, key_id, age_secs
        );

        Ok(WebhookEnvelope {
            webhook_type: body.webhook_type,
            webhook_code: body.webhook_code,
            item_id: body.item_id,
            issued_at,
            body_sha256: claimed,
            key_id: key_id.to_string(),
            signature_header: token.to_string(),
            raw_body,
            payload: body.payload,
        })
    }
}
