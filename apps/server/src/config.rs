use std::{net::SocketAddr, time::Duration};

use anyhow::Context;
use finlink_core::Region;
use finlink_plaid::{PlaidConfig, PlaidEnvironment};

use crate::jobs::RetryPolicy;

pub struct Config {
    pub listen_addr: SocketAddr,
    pub cors_allow: Vec<String>,
    pub request_timeout: Duration,
    /// Public URL of the webhook endpoint, registered on new Link tokens.
    pub webhook_url: Option<String>,
    /// OAuth redirect URI registered on new Link tokens.
    pub redirect_url: Option<String>,
    /// Interval of the periodic transaction sync, `None` disables it.
    pub sync_interval: Option<Duration>,
    /// Backoff for background syncs that failed with a transient error.
    pub job_retry: RetryPolicy,
    /// Provider credentials for every configured region.
    pub providers: Vec<(Region, PlaidConfig)>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the config from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let listen_addr: SocketAddr = var("FINLINK_LISTEN_ADDR")
            .unwrap_or_else(|| "0.0.0.0:8080".to_string())
            .parse()
            .context("Invalid FINLINK_LISTEN_ADDR")?;
        let cors_allow = var("FINLINK_CORS_ALLOW_ORIGINS")
            .unwrap_or_else(|| "*".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        let timeout_ms: u64 = var("FINLINK_REQUEST_TIMEOUT_MS")
            .and_then(|v| v.parse().ok())
            .unwrap_or(30000);
        let sync_interval = var("FINLINK_SYNC_INTERVAL_SECS")
            .and_then(|v| v.parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs);
        let request_timeout = Duration::from_millis(timeout_ms);
        let defaults = RetryPolicy::default();
        let job_retry = RetryPolicy {
            base_delay: var("FINLINK_SYNC_RETRY_BASE_MS")
                .and_then(|v| v.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.base_delay),
            max_retries: var("FINLINK_SYNC_MAX_RETRIES")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_retries),
        };

        let mut providers = Vec::new();
        for (region, prefix) in [(Region::Us, "PLAID"), (Region::Eu, "PLAID_EU")] {
            let client_id = var(&format!("{prefix}_CLIENT_ID"));
            let secret = var(&format!("{prefix}_SECRET"));
            let (Some(client_id), Some(secret)) = (client_id, secret) else {
                continue;
            };
            let environment: PlaidEnvironment = var(&format!("{prefix}_ENV"))
                .unwrap_or_else(|| "sandbox".to_string())
                .parse()
                .with_context(|| format!("Invalid {prefix}_ENV"))?;

            let mut provider = PlaidConfig::new(client_id, secret, environment)
                .with_timeout(request_timeout);
            if let Some(base_url) = var(&format!("{prefix}_BASE_URL")) {
                provider = provider.with_base_url(base_url);
            }
            if let Some(name) = var("FINLINK_CLIENT_NAME") {
                provider = provider.with_client_name(name);
            }
            providers.push((region, provider));
        }

        Ok(Self {
            listen_addr,
            cors_allow,
            request_timeout,
            webhook_url: var("FINLINK_WEBHOOK_URL"),
            redirect_url: var("FINLINK_REDIRECT_URL"),
            sync_interval,
            job_retry,
            providers,
        })
    }

    /// Webhook URL a region's Link tokens register. EU items post to their own path.
    pub fn webhook_url_for(&self, region: Region) -> Option<String> {
        let base = self.webhook_url.as_deref()?.trim_end_matches('/');
        Some(match region {
            Region::Us => base.to_string(),
            Region::Eu => format!("{base}_eu"),
        })
    }
}
