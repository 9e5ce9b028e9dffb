//! Provider client configuration.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use finlink_core::constants::{FAST_ITERATION_MAX_HISTORY_DAYS, PRODUCTION_MAX_HISTORY_DAYS};
use finlink_core::Error;

/// Default timeout for API requests.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default client name shown in the Link UI.
pub const DEFAULT_CLIENT_NAME: &str = "Finlink";

/// Provider environment. Selects the API host and the history window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaidEnvironment {
    Sandbox,
    Development,
    Production,
}

impl PlaidEnvironment {
    pub fn base_url(&self) -> &'static str {
        match self {
            PlaidEnvironment::Sandbox => "https://sandbox.plaid.com",
            PlaidEnvironment::Development => "https://development.plaid.com",
            PlaidEnvironment::Production => "https://production.plaid.com",
        }
    }

    /// Maximum number of days of history requested for a new item.
    ///
    /// Sandbox and development keep a short window so that test items sync fast.
    pub fn max_history_days(&self) -> i64 {
        match self {
            PlaidEnvironment::Production => PRODUCTION_MAX_HISTORY_DAYS,
            PlaidEnvironment::Sandbox | PlaidEnvironment::Development => {
                FAST_ITERATION_MAX_HISTORY_DAYS
            }
        }
    }
}

impl fmt::Display for PlaidEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sandbox => write!(f, "sandbox"),
            Self::Development => write!(f, "development"),
            Self::Production => write!(f, "production"),
        }
    }
}

impl FromStr for PlaidEnvironment {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sandbox" => Ok(Self::Sandbox),
            "development" => Ok(Self::Development),
            "production" => Ok(Self::Production),
            other => Err(Error::config(format!("Unknown Plaid environment '{}'", other))),
        }
    }
}

/// Credentials and environment for one region's provider client.
#[derive(Clone)]
pub struct PlaidConfig {
    pub client_id: String,
    pub secret: String,
    pub environment: PlaidEnvironment,
    pub client_name: String,
    pub timeout: Duration,
    /// Overrides the environment host (used by tests and proxies).
    pub base_url: Option<String>,
}

impl PlaidConfig {
    pub fn new(
        client_id: impl Into<String>,
        secret: impl Into<String>,
        environment: PlaidEnvironment,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            secret: secret.into(),
            environment,
            client_name: DEFAULT_CLIENT_NAME.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            base_url: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn with_client_name(mut self, name: impl Into<String>) -> Self {
        self.client_name = name.into();
        self
    }

    /// Host requests are sent to, without a trailing slash.
    pub fn resolved_base_url(&self) -> String {
        self.base_url
            .as_deref()
            .unwrap_or_else(|| self.environment.base_url())
            .trim_end_matches('/')
            .to_string()
    }
}

impl fmt::Debug for PlaidConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlaidConfig")
            .field("client_id", &self.client_id)
            .field("secret", &"***")
            .field("environment", &self.environment)
            .field("client_name", &self.client_name)
            .field("timeout", &self.timeout)
            .field("base_url", &self.base_url)
            .finish()
    }
}
