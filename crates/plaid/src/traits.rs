//! Trait defining the contract for the aggregator's remote operations.

use async_trait::async_trait;

use finlink_core::constants::PRODUCTION_MAX_HISTORY_DAYS;
use finlink_core::{AccessToken, Result};

use crate::link::LinkTokenRequest;
use crate::types::{
    Account, HoldingsPage, InvestmentTransactionsPage, InvestmentTransactionsRequest,
    ItemStatus, Liabilities, LinkToken, TokenExchange, TransactionsSyncPage,
    TransactionsSyncRequest, WebhookVerificationKey,
};

/// Thin typed wrapper over the aggregator API.
///
/// One method per remote operation. Implementations translate transport and
/// provider failures into [`finlink_core::Error`] and never retry.
#[async_trait]
pub trait AggregatorApi: Send + Sync {
    /// Create a Link token for the client-side linking flow.
    async fn create_link_token(&self, request: LinkTokenRequest) -> Result<LinkToken>;

    /// Exchange a Link public token for a durable item access token.
    async fn exchange_public_token(&self, public_token: &str) -> Result<TokenExchange>;

    /// Fetch provider-side item metadata.
    async fn get_item(&self, access_token: &AccessToken) -> Result<ItemStatus>;

    /// Revoke the access token and remove the item at the provider.
    async fn remove_item(&self, access_token: &AccessToken) -> Result<()>;

    /// Fetch the accounts of an item with cached balances.
    async fn get_accounts(&self, access_token: &AccessToken) -> Result<Vec<Account>>;

    /// Fetch one page of the incremental transaction feed.
    async fn sync_transactions(
        &self,
        request: &TransactionsSyncRequest<'_>,
    ) -> Result<TransactionsSyncPage>;

    /// Fetch all holdings with the securities and accounts they reference.
    async fn get_holdings(&self, access_token: &AccessToken) -> Result<HoldingsPage>;

    /// Fetch one offset page of investment transactions.
    async fn get_investment_transactions(
        &self,
        request: &InvestmentTransactionsRequest<'_>,
    ) -> Result<InvestmentTransactionsPage>;

    /// Fetch liabilities (credit cards, mortgages, student loans).
    async fn get_liabilities(&self, access_token: &AccessToken) -> Result<Liabilities>;

    /// Fetch the public key used to sign webhooks with the given key id.
    async fn get_webhook_verification_key(&self, key_id: &str) -> Result<WebhookVerificationKey>;

    /// History window used when the caller gives no start date.
    fn max_history_days(&self) -> i64 {
        PRODUCTION_MAX_HISTORY_DAYS
    }
}
