//! Finlink Webhooks - Authenticity verification and dispatch of provider webhooks.
//!
//! Deliveries are verified by [`WebhookVerifier`] (ES256 signature, freshness
//! window, body hash) and routed by [`WebhookDispatcher`] to a [`SyncTrigger`].
//! [`WebhookHandler`] composes the two for the HTTP endpoint.

mod dispatcher;
mod envelope;
mod error;
mod handler;
mod keys;
mod verifier;

#[cfg(test)]
mod test_support;

pub use dispatcher::{route, DispatchOutcome, SyncKind, SyncTrigger, WebhookDispatcher};
pub use envelope::WebhookEnvelope;
pub use error::{Result, VerificationError, WebhookError};
pub use handler::WebhookHandler;
pub use keys::{SigningKeyCache, SIGNING_ALGORITHM};
pub use verifier::{VerifierConfig, WebhookVerifier};

/// Header carrying the signed JWS.
pub const VERIFICATION_HEADER: &str = "plaid-verification";
