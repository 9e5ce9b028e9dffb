//! Error types and retry classification for the sync engine.
//!
//! This module provides:
//! - [`Error`]: The error enum shared by the provider client and sync engines
//! - [`RetryClass`]: How a caller (scheduler or job layer) should react to an error
//!
//! Error messages never carry access tokens, provider secrets or raw response
//! bodies.

mod retry;

pub use retry::RetryClass;

use std::fmt;

use thiserror::Error;

use crate::constants::RATE_LIMIT_ERROR_TYPE;

/// Type alias for Result using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// The kind of cross-reference that failed to resolve during enrichment.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ReferenceKind {
    Security,
    Account,
}

impl fmt::Display for ReferenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Security => write!(f, "security"),
            Self::Account => write!(f, "account"),
        }
    }
}

/// Errors surfaced by the provider client and the sync engines.
///
/// Each variant is classified into a [`RetryClass`] via
/// [`retry_class`](Self::retry_class). The engine never retries on its own.
#[derive(Error, Debug)]
pub enum Error {
    /// Network failure, timeout or an unreadable response stream.
    /// Always retryable by the caller.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The provider rejected the request with an error payload.
    #[error("Provider API error ({status}) {error_type}/{code}: {message}")]
    RemoteApi {
        /// HTTP status code of the response
        status: u16,
        /// Provider error type (e.g. "RATE_LIMIT_EXCEEDED")
        error_type: String,
        /// Provider error code (e.g. "TRANSACTIONS_LIMIT")
        code: String,
        /// Human readable provider message
        message: String,
    },

    /// The access token is invalid, revoked or needs the user to re-link.
    /// Terminal until the item is re-linked.
    #[error("Item authentication failed: {code}")]
    Auth {
        /// Provider error code (e.g. "ITEM_LOGIN_REQUIRED")
        code: String,
    },

    /// A record references a security or account absent from its own page.
    #[error("Unresolved {kind} reference '{reference_id}' on record '{record_id}'")]
    UnresolvedReference {
        kind: ReferenceKind,
        record_id: String,
        reference_id: String,
    },

    /// The provider violated the pagination protocol, or a sanity bound tripped.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The caller supplied an invalid request (e.g. inverted date range).
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Missing or invalid configuration (e.g. no credentials for a region).
    #[error("Configuration error: {0}")]
    Config(String),

    /// The ledger has no item with this id.
    #[error("Item '{0}' is not linked")]
    ItemNotFound(String),

    /// Another sync already holds the lease for this item.
    #[error("A sync is already in progress for item '{0}'")]
    SyncInProgress(String),

    /// The ledger layer failed to apply a result or persist a cursor.
    #[error("Ledger error: {0}")]
    Ledger(String),
}

impl Error {
    /// Create a protocol error.
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol(message.into())
    }

    /// Create a ledger error.
    pub fn ledger(message: impl Into<String>) -> Self {
        Self::Ledger(message.into())
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Returns the retry classification for this error.
    ///
    /// ```
    /// use finlink_core::errors::{Error, RetryClass};
    ///
    /// let error = Error::Transport("timed out".to_string());
    /// assert_eq!(error.retry_class(), RetryClass::WithBackoff);
    ///
    /// let error = Error::Auth { code: "ITEM_LOGIN_REQUIRED".to_string() };
    /// assert_eq!(error.retry_class(), RetryClass::Relink);
    /// ```
    pub fn retry_class(&self) -> RetryClass {
        match self {
            Self::Transport(_) | Self::SyncInProgress(_) | Self::Ledger(_) => {
                RetryClass::WithBackoff
            }
            Self::RemoteApi {
                status, error_type, ..
            } => {
                if error_type == RATE_LIMIT_ERROR_TYPE || *status == 429 || *status >= 500 {
                    RetryClass::WithBackoff
                } else {
                    RetryClass::Never
                }
            }
            Self::Auth { .. } => RetryClass::Relink,
            Self::UnresolvedReference { .. }
            | Self::Protocol(_)
            | Self::InvalidRequest(_)
            | Self::ItemNotFound(_)
            | Self::Config(_) => RetryClass::Never,
        }
    }

    /// Returns true if the item must be re-linked by the user before syncing again.
    pub fn requires_relink(&self) -> bool {
        self.retry_class() == RetryClass::Relink
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Transport(err.without_url().to_string())
    }
}
