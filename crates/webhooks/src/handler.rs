//! Verify-then-dispatch entry point for the webhook endpoint.

use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, Utc};

use finlink_plaid::AggregatorApi;

use crate::dispatcher::{DispatchOutcome, SyncTrigger, WebhookDispatcher};
use crate::error::WebhookError;
use crate::verifier::{VerifierConfig, WebhookVerifier};

/// Composes a [`WebhookVerifier`] and a [`WebhookDispatcher`].
///
/// A webhook reaches the dispatcher only after every verification check
/// passed.
pub struct WebhookHandler {
    verifier: WebhookVerifier,
    dispatcher: WebhookDispatcher,
}

impl WebhookHandler {
    pub fn new(key_source: Arc<dyn AggregatorApi>, trigger: Arc<dyn SyncTrigger>) -> Self {
        Self::with_config(key_source, trigger, VerifierConfig::default())
    }

    pub fn with_config(
        key_source: Arc<dyn AggregatorApi>,
        trigger: Arc<dyn SyncTrigger>,
        config: VerifierConfig,
    ) -> Self {
        Self {
            verifier: WebhookVerifier::with_config(key_source, config),
            dispatcher: WebhookDispatcher::new(trigger),
        }
    }

    /// Verify a delivery and hand it to the dispatcher.
    ///
    /// Success means the sync was accepted for execution, not that it ran.
    pub async fn verify_and_dispatch(
        &self,
        raw_body: Bytes,
        signature_header: &str,
    ) -> Result<DispatchOutcome, WebhookError> {
        self.verify_and_dispatch_at(raw_body, signature_header, Utc::now())
            .await
    }

    pub async fn verify_and_dispatch_at(
        &self,
        raw_body: Bytes,
        signature_header: &str,
        now: DateTime<Utc>,
    ) -> Result<DispatchOutcome, WebhookError> {
        let envelope = self
            .verifier
            .verify_at(raw_body, signature_header, now)
            .await?;
        self.dispatcher.dispatch(&envelope).await
    }
}
