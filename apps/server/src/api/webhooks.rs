//! Provider webhook endpoints.
//!
//! The body is taken as raw bytes: its SHA-256 is compared against the signed
//! claim, so it must not be re-serialized before verification.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::HeaderMap,
    routing::post,
    Json, Router,
};
use serde::Serialize;

use crate::{
    error::{ApiError, ApiResult},
    main_lib::AppState,
};
use finlink_core::Region;
use finlink_webhooks::{
    DispatchOutcome, SyncKind, VerificationError, WebhookError, VERIFICATION_HEADER,
};

#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum WebhookResponse {
    #[serde(rename_all = "camelCase")]
    Triggered { item_id: String, kind: SyncKind },
    #[serde(rename_all = "camelCase")]
    Ignored {
        webhook_type: String,
        webhook_code: String,
    },
}

impl From<DispatchOutcome> for WebhookResponse {
    fn from(outcome: DispatchOutcome) -> Self {
        match outcome {
            DispatchOutcome::Triggered { item_id, kind } => Self::Triggered { item_id, kind },
            DispatchOutcome::Ignored {
                webhook_type,
                webhook_code,
            } => Self::Ignored {
                webhook_type,
                webhook_code,
            },
        }
    }
}

async fn receive(
    state: &AppState,
    region: Region,
    headers: &HeaderMap,
    body: Bytes,
) -> ApiResult<Json<WebhookResponse>> {
    let handler = state.webhooks.get(&region).ok_or(ApiError::NotFound)?;
    let signature = headers
        .get(VERIFICATION_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            tracing::warn!("Rejected {} webhook: missing {} header", region, VERIFICATION_HEADER);
            WebhookError::from(VerificationError::malformed_header("missing signature header"))
        })?;

    let outcome = handler.verify_and_dispatch(body, signature).await?;
    Ok(Json(outcome.into()))
}

async fn receive_us(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<WebhookResponse>> {
    receive(&state, Region::Us, &headers, body).await
}

async fn receive_eu(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<WebhookResponse>> {
    receive(&state, Region::Eu, &headers, body).await
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/webhooks/plaid", post(receive_us))
        .route("/webhooks/plaid_eu", post(receive_eu))
}
