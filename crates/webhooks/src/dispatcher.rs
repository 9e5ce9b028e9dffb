//! Routing of verified webhooks to sync triggers.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::envelope::WebhookEnvelope;
use crate::error::{VerificationError, WebhookError};

/// Which sync a webhook asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncKind {
    Transactions,
    Investments,
    Holdings,
}

impl fmt::Display for SyncKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transactions => write!(f, "transactions"),
            Self::Investments => write!(f, "investments"),
            Self::Holdings => write!(f, "holdings"),
        }
    }
}

/// Every (webhook type, webhook code) pair that triggers a sync.
const ROUTES: &[(&str, &str, SyncKind)] = &[
    ("TRANSACTIONS", "SYNC_UPDATES_AVAILABLE", SyncKind::Transactions),
    ("INVESTMENTS_TRANSACTIONS", "DEFAULT_UPDATE", SyncKind::Investments),
    ("HOLDINGS", "DEFAULT_UPDATE", SyncKind::Holdings),
];

/// Look up the sync a webhook asks for, if any.
pub fn route(webhook_type: &str, webhook_code: &str) -> Option<SyncKind> {
    ROUTES
        .iter()
        .find(|(t, c, _)| *t == webhook_type && *c == webhook_code)
        .map(|(_, _, kind)| *kind)
}

/// Accepts sync requests for later execution.
///
/// Implementations must return once the request is accepted; the sync itself
/// runs elsewhere.
#[async_trait]
pub trait SyncTrigger: Send + Sync {
    async fn trigger(&self, item_id: &str, kind: SyncKind) -> finlink_core::Result<()>;
}

/// What the dispatcher did with a webhook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Triggered { item_id: String, kind: SyncKind },
    /// No route for this pair. Not an error.
    Ignored {
        webhook_type: String,
        webhook_code: String,
    },
}

/// Maps verified webhooks onto sync triggers.
pub struct WebhookDispatcher {
    trigger: Arc<dyn SyncTrigger>,
}

impl WebhookDispatcher {
    pub fn new(trigger: Arc<dyn SyncTrigger>) -> Self {
        Self { trigger }
    }

    /// Dispatch a verified webhook.
    ///
    /// Unrouted pairs are logged and ignored.
    ///
    /// # Errors
    ///
    /// Returns [`WebhookError::Verification`] when a routed webhook carries no
    /// item id, and [`WebhookError::Trigger`] when the trigger refuses the request.
    pub async fn dispatch(
        &self,
        envelope: &WebhookEnvelope,
    ) -> std::result::Result<DispatchOutcome, WebhookError> {
        let Some(kind) = route(&envelope.webhook_type, &envelope.webhook_code) else {
            warn!(
                "[Webhooks] Unhandled webhook {}/{} for item {}",
                envelope.webhook_type,
                envelope.webhook_code,
                envelope.item_id.as_deref().unwrap_or("-")
            );
            return Ok(DispatchOutcome::Ignored {
                webhook_type: envelope.webhook_type.clone(),
                webhook_code: envelope.webhook_code.clone(),
            });
        };

        let item_id = envelope.item_id.clone().ok_or_else(|| {
            VerificationError::malformed_payload(format!(
                "{}/{} webhook without item_id",
                envelope.webhook_type, envelope.webhook_code
            ))
        })?;

        self.trigger.trigger(&item_id, kind).await?;
        info!(
            "[Webhooks] Scheduled {} sync for item {} ({}/{})",
            kind, item_id, envelope.webhook_type, envelope.webhook_code
        );

        Ok(DispatchOutcome::Triggered { item_id, kind })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::RecordingTrigger;
    use bytes::Bytes;
    use chrono::Utc;
    use std::sync::atomic::Ordering;

    fn envelope(webhook_type: &str, webhook_code: &str, item_id: Option<&str>) -> WebhookEnvelope {
        WebhookEnvelope {
            webhook_type: webhook_type.to_string(),
            webhook_code: webhook_code.to_string(),
            item_id: item_id.map(str::to_string),
            issued_at: Utc::now(),
            body_sha256: String::new(),
            key_id: "kid-1".to_string(),
            signature_header: String::new(),
            raw_body: Bytes::new(),
            payload: serde_json::Value::Null,
        }
    }

    #[test]
    fn test_route_table() {
        assert_eq!(
            route("TRANSACTIONS", "SYNC_UPDATES_AVAILABLE"),
            Some(SyncKind::Transactions)
        );
        assert_eq!(
            route("INVESTMENTS_TRANSACTIONS", "DEFAULT_UPDATE"),
            Some(SyncKind::Investments)
        );
        assert_eq!(route("HOLDINGS", "DEFAULT_UPDATE"), Some(SyncKind::Holdings));
        assert_eq!(route("TRANSACTIONS", "DEFAULT_UPDATE"), None);
        assert_eq!(route("ITEM", "ERROR"), None);
        assert_eq!(route("transactions", "sync_updates_available"), None);
    }

    #[tokio::test]
    async fn test_each_route_triggers_its_sync() {
        let trigger = Arc::new(RecordingTrigger::default());
        let dispatcher = WebhookDispatcher::new(trigger.clone());

        for (webhook_type, webhook_code, kind) in ROUTES {
            let outcome = dispatcher
                .dispatch(&envelope(webhook_type, webhook_code, Some("item-1")))
                .await
                .unwrap();
            assert_eq!(
                outcome,
                DispatchOutcome::Triggered {
                    item_id: "item-1".to_string(),
                    kind: *kind
                }
            );
        }

        assert_eq!(
            trigger.calls(),
            vec![
                ("item-1".to_string(), SyncKind::Transactions),
                ("item-1".to_string(), SyncKind::Investments),
                ("item-1".to_string(), SyncKind::Holdings),
            ]
        );
    }

    #[tokio::test]
    async fn test_unknown_pair_is_a_noop() {
        let trigger = Arc::new(RecordingTrigger::default());
        let dispatcher = WebhookDispatcher::new(trigger.clone());

        let outcome = dispatcher
            .dispatch(&envelope("ITEM", "NEW_ACCOUNTS_AVAILABLE", Some("item-1")))
            .await
            .unwrap();

        assert!(matches!(outcome, DispatchOutcome::Ignored { .. }));
        assert!(trigger.calls().is_empty());
    }

    #[tokio::test]
    async fn test_routed_webhook_without_item_is_malformed() {
        let trigger = Arc::new(RecordingTrigger::default());
        let dispatcher = WebhookDispatcher::new(trigger.clone());

        let err = dispatcher
            .dispatch(&envelope("HOLDINGS", "DEFAULT_UPDATE", None))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            WebhookError::Verification(VerificationError::MalformedPayload(_))
        ));
        assert!(trigger.calls().is_empty());
    }

    #[tokio::test]
    async fn test_trigger_refusal_is_reported() {
        let trigger = Arc::new(RecordingTrigger::default());
        trigger.reject.store(true, Ordering::SeqCst);
        let dispatcher = WebhookDispatcher::new(trigger);

        let err = dispatcher
            .dispatch(&envelope("TRANSACTIONS", "SYNC_UPDATES_AVAILABLE", Some("item-1")))
            .await
            .unwrap_err();
        assert!(matches!(err, WebhookError::Trigger(_)));
    }
}
