//! Key source, trigger double and token signing helpers for webhook tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use p256::ecdsa::signature::Signer;
use p256::ecdsa::{Signature, SigningKey};
use p256::elliptic_curve::sec1::ToEncodedPoint;
use serde_json::json;
use sha2::{Digest, Sha256};
use tokio::sync::Notify;

use finlink_core::{AccessToken, Error, Result};
use finlink_plaid::{
    Account, AggregatorApi, HoldingsPage, InvestmentTransactionsPage,
    InvestmentTransactionsRequest, ItemStatus, Liabilities, LinkToken, LinkTokenRequest,
    TokenExchange, TransactionsSyncPage, TransactionsSyncRequest, WebhookVerificationKey,
};

use crate::dispatcher::{SyncKind, SyncTrigger};

pub fn signing_key() -> SigningKey {
    SigningKey::from_slice(&[7u8; 32]).unwrap()
}

pub fn other_signing_key() -> SigningKey {
    SigningKey::from_slice(&[9u8; 32]).unwrap()
}

/// Public JWK for a signing key, as the provider would return it.
pub fn jwk_for(key: &SigningKey, kid: &str) -> WebhookVerificationKey {
    let point = key.verifying_key().as_affine().to_encoded_point(false);
    WebhookVerificationKey {
        kid: kid.to_string(),
        alg: "ES256".to_string(),
        kty: "EC".to_string(),
        crv: "P-256".to_string(),
        key_use: "sig".to_string(),
        x: URL_SAFE_NO_PAD.encode(point.x().unwrap()),
        y: URL_SAFE_NO_PAD.encode(point.y().unwrap()),
        created_at: Some(1_700_000_000),
        expired_at: None,
    }
}

pub fn body_sha256(body: &[u8]) -> String {
    hex::encode(Sha256::digest(body))
}

/// Compact JWS over the given claims with an arbitrary JOSE header.
pub fn sign_token(key: &SigningKey, header: serde_json::Value, claims: serde_json::Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(header.to_string());
    let claims = URL_SAFE_NO_PAD.encode(claims.to_string());
    let signing_input = format!("{}.{}", header, claims);
    let signature: Signature = key.sign(signing_input.as_bytes());
    format!(
        "{}.{}",
        signing_input,
        URL_SAFE_NO_PAD.encode(signature.to_bytes())
    )
}

/// Signature header for a body issued at `iat`.
pub fn sign_webhook(key: &SigningKey, kid: &str, body: &[u8], iat: i64) -> String {
    sign_token(
        key,
        json!({"alg": "ES256", "kid": kid, "typ": "JWT"}),
        json!({"iat": iat, "request_body_sha256": body_sha256(body)}),
    )
}

/// Provider double serving webhook verification keys by id.
#[derive(Default)]
pub struct KeySource {
    keys: Mutex<HashMap<String, WebhookVerificationKey>>,
    fetches: AtomicUsize,
    fail_transport: AtomicBool,
    hold: AtomicBool,
    started: Notify,
    release: Notify,
}

impl KeySource {
    pub fn with_key(jwk: WebhookVerificationKey) -> Self {
        let source = Self::default();
        source.add_key(jwk);
        source
    }

    pub fn add_key(&self, jwk: WebhookVerificationKey) {
        self.keys.lock().unwrap().insert(jwk.kid.clone(), jwk);
    }

    pub fn fail_with_transport(&self) {
        self.fail_transport.store(true, Ordering::SeqCst);
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    /// Park the next fetch until [`KeySource::release_fetch`].
    pub fn hold_fetches(&self) {
        self.hold.store(true, Ordering::SeqCst);
    }

    pub async fn fetch_started(&self) {
        self.started.notified().await;
    }

    pub fn release_fetch(&self) {
        self.hold.store(false, Ordering::SeqCst);
        self.release.notify_one();
    }
}

fn not_scripted<T>() -> Result<T> {
    Err(Error::protocol("not scripted"))
}

#[async_trait]
impl AggregatorApi for KeySource {
    async fn create_link_token(&self, _request: LinkTokenRequest) -> Result<LinkToken> {
        not_scripted()
    }

    async fn exchange_public_token(&self, _public_token: &str) -> Result<TokenExchange> {
        not_scripted()
    }

    async fn get_item(&self, _access_token: &AccessToken) -> Result<ItemStatus> {
        not_scripted()
    }

    async fn remove_item(&self, _access_token: &AccessToken) -> Result<()> {
        not_scripted()
    }

    async fn get_accounts(&self, _access_token: &AccessToken) -> Result<Vec<Account>> {
        not_scripted()
    }

    async fn sync_transactions(
        &self,
        _request: &TransactionsSyncRequest<'_>,
    ) -> Result<TransactionsSyncPage> {
        not_scripted()
    }

    async fn get_holdings(&self, _access_token: &AccessToken) -> Result<HoldingsPage> {
        not_scripted()
    }

    async fn get_investment_transactions(
        &self,
        _request: &InvestmentTransactionsRequest<'_>,
    ) -> Result<InvestmentTransactionsPage> {
        not_scripted()
    }

    async fn get_liabilities(&self, _access_token: &AccessToken) -> Result<Liabilities> {
        not_scripted()
    }

    async fn get_webhook_verification_key(&self, key_id: &str) -> Result<WebhookVerificationKey> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.hold.load(Ordering::SeqCst) {
            self.started.notify_one();
            self.release.notified().await;
        }
        if self.fail_transport.load(Ordering::SeqCst) {
            return Err(Error::Transport("connection refused".to_string()));
        }
        self.keys
            .lock()
            .unwrap()
            .get(key_id)
            .cloned()
            .ok_or_else(|| Error::RemoteApi {
                status: 400,
                error_type: "INVALID_INPUT".to_string(),
                code: "INVALID_WEBHOOK_VERIFICATION_KEY_ID".to_string(),
                message: "invalid key_id provided".to_string(),
            })
    }
}

/// Trigger double recording accepted sync requests.
#[derive(Default)]
pub struct RecordingTrigger {
    pub triggered: Mutex<Vec<(String, SyncKind)>>,
    pub reject: AtomicBool,
}

impl RecordingTrigger {
    pub fn calls(&self) -> Vec<(String, SyncKind)> {
        self.triggered.lock().unwrap().clone()
    }
}

#[async_trait]
impl SyncTrigger for RecordingTrigger {
    async fn trigger(&self, item_id: &str, kind: SyncKind) -> Result<()> {
        if self.reject.load(Ordering::SeqCst) {
            return Err(Error::SyncInProgress(item_id.to_string()));
        }
        self.triggered
            .lock()
            .unwrap()
            .push((item_id.to_string(), kind));
        Ok(())
    }
}
