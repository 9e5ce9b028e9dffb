//! HTTP client for the Plaid API.
//!
//! Every endpoint is a JSON `POST`. Client credentials travel in headers so
//! that request bodies only carry the item's access token.

use async_trait::async_trait;
use chrono::NaiveDate;
use log::{debug, info, warn};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use finlink_core::constants::RELINK_ERROR_CODES;
use finlink_core::{AccessToken, Error, Result};

use crate::config::PlaidConfig;
use crate::link::LinkTokenRequest;
use crate::traits::AggregatorApi;
use crate::types::{
    Account, HoldingsPage, InvestmentTransactionsPage, InvestmentTransactionsRequest,
    ItemStatus, Liabilities, LinkToken, TokenExchange, TransactionsSyncPage,
    TransactionsSyncRequest, WebhookVerificationKey,
};

/// API version pinned for every request.
pub const PLAID_API_VERSION: &str = "2020-09-14";

const CLIENT_ID_HEADER: &str = "plaid-client-id";
const SECRET_HEADER: &str = "plaid-secret";
const VERSION_HEADER: &str = "plaid-version";

// ─────────────────────────────────────────────────────────────────────────────
// Wire Types (internal, for building requests and parsing responses)
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct AccessTokenBody<'a> {
    access_token: &'a str,
}

#[derive(Serialize)]
struct PublicTokenBody<'a> {
    public_token: &'a str,
}

#[derive(Serialize)]
struct KeyIdBody<'a> {
    key_id: &'a str,
}

#[derive(Serialize)]
struct TransactionsSyncBody<'a> {
    access_token: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    cursor: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    count: Option<u32>,
}

#[derive(Serialize)]
struct InvestmentTransactionsOptions {
    offset: u32,
    count: u32,
}

#[derive(Serialize)]
struct InvestmentTransactionsBody<'a> {
    access_token: &'a str,
    start_date: NaiveDate,
    end_date: NaiveDate,
    options: InvestmentTransactionsOptions,
}

#[derive(Deserialize)]
struct ApiExchangeResponse {
    access_token: String,
    item_id: String,
}

#[derive(Deserialize)]
struct ApiItemResponse {
    item: ItemStatus,
}

#[derive(Deserialize)]
struct ApiAccountsResponse {
    #[serde(default)]
    accounts: Vec<Account>,
}

#[derive(Deserialize)]
struct ApiLiabilitiesResponse {
    #[serde(default)]
    liabilities: Liabilities,
}

#[derive(Deserialize)]
struct ApiKeyResponse {
    key: WebhookVerificationKey,
}

#[derive(Deserialize)]
struct ApiEmptyResponse {}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    #[serde(default)]
    error_type: Option<String>,
    #[serde(default)]
    error_code: Option<String>,
    #[serde(default)]
    error_message: Option<String>,
    #[serde(default)]
    request_id: Option<String>,
}

/// A rejected call: the mapped error plus the provider's request id, which
/// support tickets ask for.
#[derive(Debug)]
pub(crate) struct ApiFailure {
    pub(crate) error: Error,
    pub(crate) request_id: Option<String>,
}

/// Translate a non-2xx provider response into the error taxonomy.
///
/// Item credential failures become [`Error::Auth`]; everything else that the
/// provider rejected is an [`Error::RemoteApi`]. The raw body is never copied
/// into the error.
pub(crate) fn map_api_error(status: u16, body: &str) -> ApiFailure {
    let Ok(err) = serde_json::from_str::<ApiErrorResponse>(body) else {
        return ApiFailure {
            error: Error::RemoteApi {
                status,
                error_type: "UNKNOWN".to_string(),
                code: "UNPARSEABLE_ERROR".to_string(),
                message: format!("HTTP {}", status),
            },
            request_id: None,
        };
    };

    let error_type = err.error_type.unwrap_or_else(|| "UNKNOWN".to_string());
    let code = err.error_code.unwrap_or_else(|| "UNKNOWN".to_string());

    let error = if RELINK_ERROR_CODES.contains(&code.as_str())
        || error_type == "INVALID_ACCESS_TOKEN"
    {
        Error::Auth { code }
    } else {
        Error::RemoteApi {
            status,
            error_type,
            code,
            message: err
                .error_message
                .unwrap_or_else(|| format!("HTTP {}", status)),
        }
    };
    ApiFailure {
        error,
        request_id: err.request_id,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Plaid API Client
// ─────────────────────────────────────────────────────────────────────────────

/// HTTP client for one region's Plaid credentials.
///
/// # Example
///
/// ```ignore
/// let config = PlaidConfig::new("client-id", "secret", PlaidEnvironment::Sandbox);
/// let client = PlaidClient::new(config)?;
/// let accounts = client.get_accounts(&item.access_token).await?;
/// ```
#[derive(Debug, Clone)]
pub struct PlaidClient {
    client: reqwest::Client,
    base_url: String,
    headers: HeaderMap,
    client_name: String,
    max_history_days: i64,
}

impl PlaidClient {
    /// Create a new client.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the credentials cannot be placed in headers
    /// or the HTTP client cannot be initialized.
    pub fn new(config: PlaidConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            HeaderName::from_static(VERSION_HEADER),
            HeaderValue::from_static(PLAID_API_VERSION),
        );
        let client_id = HeaderValue::from_str(&config.client_id)
            .map_err(|_| Error::config("Invalid Plaid client id format"))?;
        let mut secret = HeaderValue::from_str(&config.secret)
            .map_err(|_| Error::config("Invalid Plaid secret format"))?;
        secret.set_sensitive(true);
        headers.insert(HeaderName::from_static(CLIENT_ID_HEADER), client_id);
        headers.insert(HeaderName::from_static(SECRET_HEADER), secret);

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::config(format!("Failed to initialize HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.resolved_base_url(),
            headers,
            client_name: config.client_name.clone(),
            max_history_days: config.environment.max_history_days(),
        })
    }

    /// Make a POST request and parse the response.
    async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        debug!("[Plaid] POST {}", path);

        let response = self
            .client
            .post(&url)
            .headers(self.headers.clone())
            .json(body)
            .send()
            .await?;

        Self::parse_response(path, response).await
    }

    /// Parse an HTTP response, handling errors appropriately.
    async fn parse_response<T: DeserializeOwned>(
        path: &str,
        response: reqwest::Response,
    ) -> Result<T> {
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let failure = map_api_error(status.as_u16(), &body);
            warn!(
                "[Plaid] {} failed (request_id={}): {}",
                path,
                failure.request_id.as_deref().unwrap_or("-"),
                failure.error
            );
            return Err(failure.error);
        }

        // serde_json messages can quote body fragments, so only report the position.
        serde_json::from_str(&body).map_err(|e| {
            Error::protocol(format!(
                "Failed to parse {} response ({:?} error at line {}, column {})",
                path,
                e.classify(),
                e.line(),
                e.column()
            ))
        })
    }
}

#[async_trait]
impl AggregatorApi for PlaidClient {
    async fn create_link_token(&self, mut request: LinkTokenRequest) -> Result<LinkToken> {
        if request.client_name.is_empty() {
            request.client_name = self.client_name.clone();
        }
        if request.transactions.days_requested == 0 {
            request.transactions.days_requested = self.max_history_days;
        }
        let token: LinkToken = self.post("/link/token/create", &request).await?;
        info!("[Plaid] Created link token expiring at {}", token.expiration);
        Ok(token)
    }

    async fn exchange_public_token(&self, public_token: &str) -> Result<TokenExchange> {
        let response: ApiExchangeResponse = self
            .post("/item/public_token/exchange", &PublicTokenBody { public_token })
            .await?;
        info!("[Plaid] Exchanged public token for item {}", response.item_id);
        Ok(TokenExchange {
            item_id: response.item_id,
            access_token: AccessToken::new(response.access_token),
        })
    }

    async fn get_item(&self, access_token: &AccessToken) -> Result<ItemStatus> {
        let response: ApiItemResponse = self
            .post(
                "/item/get",
                &AccessTokenBody {
                    access_token: access_token.expose(),
                },
            )
            .await?;
        Ok(response.item)
    }

    async fn remove_item(&self, access_token: &AccessToken) -> Result<()> {
        let _: ApiEmptyResponse = self
            .post(
                "/item/remove",
                &AccessTokenBody {
                    access_token: access_token.expose(),
                },
            )
            .await?;
        Ok(())
    }

    async fn get_accounts(&self, access_token: &AccessToken) -> Result<Vec<Account>> {
        let response: ApiAccountsResponse = self
            .post(
                "/accounts/get",
                &AccessTokenBody {
                    access_token: access_token.expose(),
                },
            )
            .await?;
        debug!("[Plaid] Fetched {} accounts", response.accounts.len());
        Ok(response.accounts)
    }

    async fn sync_transactions(
        &self,
        request: &TransactionsSyncRequest<'_>,
    ) -> Result<TransactionsSyncPage> {
        let body = TransactionsSyncBody {
            access_token: request.access_token.expose(),
            cursor: request.cursor,
            count: request.count,
        };
        self.post("/transactions/sync", &body).await
    }

    async fn get_holdings(&self, access_token: &AccessToken) -> Result<HoldingsPage> {
        self.post(
            "/investments/holdings/get",
            &AccessTokenBody {
                access_token: access_token.expose(),
            },
        )
        .await
    }

    async fn get_investment_transactions(
        &self,
        request: &InvestmentTransactionsRequest<'_>,
    ) -> Result<InvestmentTransactionsPage> {
        let body = InvestmentTransactionsBody {
            access_token: request.access_token.expose(),
            start_date: request.start_date,
            end_date: request.end_date,
            options: InvestmentTransactionsOptions {
                offset: request.offset,
                count: request.count,
            },
        };
        self.post("/investments/transactions/get", &body).await
    }

    async fn get_liabilities(&self, access_token: &AccessToken) -> Result<Liabilities> {
        let response: ApiLiabilitiesResponse = self
            .post(
                "/liabilities/get",
                &AccessTokenBody {
                    access_token: access_token.expose(),
                },
            )
            .await?;
        Ok(response.liabilities)
    }

    async fn get_webhook_verification_key(&self, key_id: &str) -> Result<WebhookVerificationKey> {
        let response: ApiKeyResponse = self
            .post("/webhook_verification_key/get", &KeyIdBody { key_id })
            .await?;
        Ok(response.key)
    }

    fn max_history_days(&self) -> i64 {
        self.max_history_days
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PlaidEnvironment;

    #[test]
    fn test_client_creation() {
        let config = PlaidConfig::new("client-id", "secret", PlaidEnvironment::Sandbox);
        let client = PlaidClient::new(config).unwrap();
        assert_eq!(client.base_url, "https://sandbox.plaid.com");
        assert_eq!(client.max_history_days(), 90);
    }

    #[test]
    fn test_invalid_secret_is_a_config_error() {
        let config = PlaidConfig::new("client-id", "bad\nsecret", PlaidEnvironment::Sandbox);
        assert!(matches!(PlaidClient::new(config), Err(Error::Config(_))));
    }

    #[test]
    fn test_secret_header_is_sensitive() {
        let config = PlaidConfig::new("client-id", "s3cr3t-value", PlaidEnvironment::Production);
        let client = PlaidClient::new(config).unwrap();
        assert!(client.headers[SECRET_HEADER].is_sensitive());
        assert!(!format!("{:?}", client).contains("s3cr3t-value"));
    }

    #[test]
    fn test_revoked_token_maps_to_auth_error() {
        let body = r#"{"error_type":"ITEM_ERROR","error_code":"ITEM_LOGIN_REQUIRED","error_message":"the login details of this item have changed","request_id":"r1"}"#;
        let failure = map_api_error(400, body);
        match failure.error {
            Error::Auth { code } => assert_eq!(code, "ITEM_LOGIN_REQUIRED"),
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(failure.request_id.as_deref(), Some("r1"));
    }

    #[test]
    fn test_rate_limit_maps_to_remote_api_error() {
        let body = r#"{"error_type":"RATE_LIMIT_EXCEEDED","error_code":"TRANSACTIONS_SYNC_LIMIT","error_message":"rate limit exceeded"}"#;
        let failure = map_api_error(429, body);
        assert!(failure.request_id.is_none());
        let err = failure.error;
        assert!(matches!(
            &err,
            Error::RemoteApi { status: 429, code, .. } if code == "TRANSACTIONS_SYNC_LIMIT"
        ));
        assert_eq!(err.retry_class(), finlink_core::RetryClass::WithBackoff);
    }

    #[test]
    fn test_unparseable_error_body_is_not_echoed() {
        let failure = map_api_error(502, "<html>access-sandbox-leak</html>");
        assert!(failure.request_id.is_none());
        let err = failure.error;
        assert!(!err.to_string().contains("access-sandbox-leak"));
        assert!(matches!(err, Error::RemoteApi { status: 502, .. }));
    }

    #[test]
    fn test_sync_body_omits_null_cursor() {
        let body = TransactionsSyncBody {
            access_token: "token",
            cursor: None,
            count: Some(500),
        };
        let json = serde_json::to_value(&body).unwrap();
        assert!(json.get("cursor").is_none());
        assert_eq!(json["count"], 500);
    }
}
