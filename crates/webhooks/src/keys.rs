//! Cache of webhook signing keys.
//!
//! Keys are fetched one key id at a time from the provider and kept for the
//! life of the process. An unknown key id forces a fetch, which is how key
//! rotation is picked up. Lookups of cached keys only take a read lock, so a
//! fetch in progress for a new key id never blocks them.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use jsonwebtoken::DecodingKey;
use log::{debug, info, warn};

use finlink_core::Error;
use finlink_plaid::{AggregatorApi, WebhookVerificationKey};

use crate::error::{Result, VerificationError};

/// Only signature keys for this algorithm are accepted.
pub const SIGNING_ALGORITHM: &str = "ES256";

const KEY_USE_SIGNATURE: &str = "sig";

#[derive(Clone)]
struct CachedKey {
    key: DecodingKey,
    expired_at: Option<i64>,
}

impl CachedKey {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expired_at.is_some_and(|at| at <= now.timestamp())
    }
}

/// Signing keys indexed by key id.
pub struct SigningKeyCache {
    source: Arc<dyn AggregatorApi>,
    keys: RwLock<HashMap<String, CachedKey>>,
}

impl SigningKeyCache {
    pub fn new(source: Arc<dyn AggregatorApi>) -> Self {
        Self {
            source,
            keys: RwLock::new(HashMap::new()),
        }
    }

    fn cached(&self, key_id: &str) -> Option<CachedKey> {
        let keys = self.keys.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        keys.get(key_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.keys
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Resolve the verifying key for a key id, fetching it when not cached.
    ///
    /// # Errors
    ///
    /// Returns [`VerificationError::UnknownKey`] when the provider does not know
    /// the key id, or the key is not a live ES256 signature key, and
    /// [`VerificationError::KeyFetch`] when the provider cannot be reached.
    pub async fn resolve(&self, key_id: &str, now: DateTime<Utc>) -> Result<DecodingKey> {
        if let Some(cached) = self.cached(key_id) {
            if !cached.is_expired(now) {
                return Ok(cached.key);
            }
            debug!("[Webhooks] Cached key {} has expired, refreshing", key_id);
        }

        let jwk = self
            .source
            .get_webhook_verification_key(key_id)
            .await
            .map_err(|e| match e {
                Error::RemoteApi { status, .. } if status < 500 && status != 429 => {
                    VerificationError::UnknownKey(key_id.to_string())
                }
                other => {
                    warn!("[Webhooks] Failed to fetch signing key {}: {}", key_id, other);
                    VerificationError::KeyFetch(other.to_string())
                }
            })?;

        let cached = decode_key(key_id, &jwk)?;
        if cached.is_expired(now) {
            return Err(VerificationError::UnknownKey(key_id.to_string()));
        }

        self.keys
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(key_id.to_string(), cached.clone());
        info!("[Webhooks] Cached signing key {}", key_id);

        Ok(cached.key)
    }
}

/// Build a P-256 decoding key from a JWK, keeping only ES256 signature keys.
fn decode_key(key_id: &str, jwk: &WebhookVerificationKey) -> Result<CachedKey> {
    if jwk.kid != key_id
        || jwk.key_use != KEY_USE_SIGNATURE
        || jwk.alg != SIGNING_ALGORITHM
        || jwk.kty != "EC"
        || jwk.crv != "P-256"
    {
        warn!(
            "[Webhooks] Ignoring key {} (use={}, alg={}, kty={}, crv={})",
            key_id, jwk.key_use, jwk.alg, jwk.kty, jwk.crv
        );
        return Err(VerificationError::UnknownKey(key_id.to_string()));
    }

    let key = DecodingKey::from_ec_components(&jwk.x, &jwk.y)
        .map_err(|_| VerificationError::UnknownKey(key_id.to_string()))?;
    Ok(CachedKey {
        key,
        expired_at: jwk.expired_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{jwk_for, sign_webhook, signing_key, KeySource};
    use crate::verifier::es256_validation;
    use std::time::Duration;

    fn verifies(key: &DecodingKey) -> bool {
        let token = sign_webhook(&signing_key(), "kid-1", b"{}", Utc::now().timestamp());
        jsonwebtoken::decode::<serde_json::Value>(&token, key, &es256_validation()).is_ok()
    }

    #[tokio::test]
    async fn test_key_is_fetched_once_then_cached() {
        let source = Arc::new(KeySource::with_key(jwk_for(&signing_key(), "kid-1")));
        let cache = SigningKeyCache::new(source.clone());

        let first = cache.resolve("kid-1", Utc::now()).await.unwrap();
        let second = cache.resolve("kid-1", Utc::now()).await.unwrap();

        assert!(verifies(&first));
        assert!(verifies(&second));
        assert_eq!(source.fetches(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_pending_refresh_does_not_block_cached_key() {
        let source = Arc::new(KeySource::with_key(jwk_for(&signing_key(), "kid-1")));
        let cache = Arc::new(SigningKeyCache::new(source.clone()));
        cache.resolve("kid-1", Utc::now()).await.unwrap();

        source.add_key(jwk_for(&signing_key(), "kid-2"));
        source.hold_fetches();
        let refresh = tokio::spawn({
            let cache = cache.clone();
            async move { cache.resolve("kid-2", Utc::now()).await.map(|_| ()) }
        });
        source.fetch_started().await;

        let cached = tokio::time::timeout(
            Duration::from_secs(1),
            cache.resolve("kid-1", Utc::now()),
        )
        .await;
        assert!(matches!(cached, Ok(Ok(_))));
        assert!(!refresh.is_finished());

        source.release_fetch();
        refresh.await.unwrap().unwrap();
        assert_eq!(source.fetches(), 2);
        assert_eq!(cache.len(), 2);
    }

    #[tokio::test]
    async fn test_unknown_kid_forces_refresh() {
        let source = Arc::new(KeySource::with_key(jwk_for(&signing_key(), "kid-1")));
        let cache = SigningKeyCache::new(source.clone());
        cache.resolve("kid-1", Utc::now()).await.unwrap();

        source.add_key(jwk_for(&signing_key(), "kid-2"));
        cache.resolve("kid-2", Utc::now()).await.unwrap();

        assert_eq!(source.fetches(), 2);
        assert_eq!(cache.len(), 2);
    }

    #[tokio::test]
    async fn test_key_missing_at_provider_is_unknown() {
        let source = Arc::new(KeySource::default());
        let cache = SigningKeyCache::new(source);

        let err = cache.resolve("kid-9", Utc::now()).await.unwrap_err();
        assert!(matches!(err, VerificationError::UnknownKey(ref kid) if kid == "kid-9"));
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_non_signature_key_is_rejected() {
        let mut jwk = jwk_for(&signing_key(), "kid-1");
        jwk.key_use = "enc".to_string();
        let cache = SigningKeyCache::new(Arc::new(KeySource::with_key(jwk)));

        let err = cache.resolve("kid-1", Utc::now()).await.unwrap_err();
        assert!(matches!(err, VerificationError::UnknownKey(_)));
    }

    #[tokio::test]
    async fn test_expired_key_is_rejected() {
        let mut jwk = jwk_for(&signing_key(), "kid-1");
        jwk.expired_at = Some(Utc::now().timestamp() - 60);
        let cache = SigningKeyCache::new(Arc::new(KeySource::with_key(jwk)));

        let err = cache.resolve("kid-1", Utc::now()).await.unwrap_err();
        assert!(matches!(err, VerificationError::UnknownKey(_)));
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_transport_failure_is_a_fetch_error() {
        let source = Arc::new(KeySource::default());
        source.fail_with_transport();
        let cache = SigningKeyCache::new(source);

        let err = cache.resolve("kid-1", Utc::now()).await.unwrap_err();
        assert!(matches!(err, VerificationError::KeyFetch(_)));
    }
}
