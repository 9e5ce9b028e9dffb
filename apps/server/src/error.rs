use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use finlink_core::Error as CoreError;
use finlink_webhooks::{VerificationError, WebhookError};

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    Core(#[from] CoreError),
    #[error("{0}")]
    Webhook(#[from] WebhookError),
    #[error("Not Found")]
    NotFound,
    #[error("{0}")]
    BadRequest(String),
}

#[derive(Serialize)]
struct ErrorBody {
    code: u16,
    message: String,
}

fn core_status(error: &CoreError) -> StatusCode {
    match error {
        CoreError::InvalidRequest(_) | CoreError::Config(_) => StatusCode::BAD_REQUEST,
        CoreError::Auth { .. } | CoreError::SyncInProgress(_) => StatusCode::CONFLICT,
        CoreError::Transport(_)
        | CoreError::RemoteApi { .. }
        | CoreError::Protocol(_)
        | CoreError::UnresolvedReference { .. } => StatusCode::BAD_GATEWAY,
        CoreError::ItemNotFound(_) => StatusCode::NOT_FOUND,
        CoreError::Ledger(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, msg) = match &self {
            ApiError::Core(e) => (core_status(e), e.to_string()),
            ApiError::Webhook(WebhookError::Verification(e)) => match e {
                VerificationError::MalformedPayload(_) => {
                    (StatusCode::BAD_REQUEST, "Malformed webhook payload".to_string())
                }
                VerificationError::KeyFetch(_) => (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "Webhook verification key unavailable".to_string(),
                ),
                // The rejection reason stays in the logs.
                _ => (
                    StatusCode::UNAUTHORIZED,
                    "Webhook verification failed".to_string(),
                ),
            },
            ApiError::Webhook(WebhookError::Trigger(e)) => {
                tracing::warn!("Webhook accepted but sync could not be queued: {}", e);
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "Sync could not be queued".to_string(),
                )
            }
            ApiError::NotFound => (StatusCode::NOT_FOUND, self.to_string()),
            ApiError::BadRequest(reason) => (StatusCode::BAD_REQUEST, reason.clone()),
        };
        let body = Json(ErrorBody {
            code: status.as_u16(),
            message: msg,
        });
        (status, body).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
