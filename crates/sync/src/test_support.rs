//! Scripted aggregator and record fixtures shared by the engine tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal_macros::dec;

use finlink_core::constants::PRODUCTION_MAX_HISTORY_DAYS;
use finlink_core::{AccessToken, Error, Result};
use finlink_plaid::{
    Account, AccountBalances, AggregatorApi, Holding, HoldingsPage, InvestmentTransaction,
    InvestmentTransactionsPage, InvestmentTransactionsRequest, ItemStatus, Liabilities,
    LinkToken, LinkTokenRequest, RemovedTransaction, Security, TokenExchange, Transaction,
    TransactionsSyncPage, TransactionsSyncRequest, WebhookVerificationKey,
};

/// Aggregator double that replays queued responses and records requests.
pub struct ScriptedApi {
    sync_pages: Mutex<VecDeque<Result<TransactionsSyncPage>>>,
    holdings: Mutex<VecDeque<Result<HoldingsPage>>>,
    investment_pages: Mutex<VecDeque<Result<InvestmentTransactionsPage>>>,
    accounts: Mutex<VecDeque<Result<Vec<Account>>>>,
    liabilities: Mutex<VecDeque<Result<Liabilities>>>,
    sync_requests: Mutex<Vec<(Option<String>, Option<u32>)>>,
    investment_requests: Mutex<Vec<(NaiveDate, NaiveDate, u32)>>,
    holdings_calls: Mutex<usize>,
    max_history_days: i64,
}

impl Default for ScriptedApi {
    fn default() -> Self {
        Self::with_history_days(PRODUCTION_MAX_HISTORY_DAYS)
    }
}

fn next<T>(queue: &Mutex<VecDeque<Result<T>>>, operation: &str) -> Result<T> {
    queue
        .lock()
        .unwrap()
        .pop_front()
        .unwrap_or_else(|| Err(Error::protocol(format!("{} not scripted", operation))))
}

impl ScriptedApi {
    pub fn with_history_days(max_history_days: i64) -> Self {
        Self {
            sync_pages: Mutex::new(VecDeque::new()),
            holdings: Mutex::new(VecDeque::new()),
            investment_pages: Mutex::new(VecDeque::new()),
            accounts: Mutex::new(VecDeque::new()),
            liabilities: Mutex::new(VecDeque::new()),
            sync_requests: Mutex::new(Vec::new()),
            investment_requests: Mutex::new(Vec::new()),
            holdings_calls: Mutex::new(0),
            max_history_days,
        }
    }

    pub fn push_sync_page(&self, page: Result<TransactionsSyncPage>) {
        self.sync_pages.lock().unwrap().push_back(page);
    }

    pub fn push_holdings(&self, page: Result<HoldingsPage>) {
        self.holdings.lock().unwrap().push_back(page);
    }

    pub fn push_investment_page(&self, page: Result<InvestmentTransactionsPage>) {
        self.investment_pages.lock().unwrap().push_back(page);
    }

    pub fn push_accounts(&self, accounts: Result<Vec<Account>>) {
        self.accounts.lock().unwrap().push_back(accounts);
    }

    pub fn push_liabilities(&self, liabilities: Result<Liabilities>) {
        self.liabilities.lock().unwrap().push_back(liabilities);
    }

    /// Cursors sent with each transaction sync request, in order.
    pub fn sync_cursors(&self) -> Vec<Option<String>> {
        self.sync_requests
            .lock()
            .unwrap()
            .iter()
            .map(|(cursor, _)| cursor.clone())
            .collect()
    }

    pub fn sync_counts(&self) -> Vec<Option<u32>> {
        self.sync_requests
            .lock()
            .unwrap()
            .iter()
            .map(|(_, count)| *count)
            .collect()
    }

    /// Offsets sent with each investment transactions request, in order.
    pub fn investment_offsets(&self) -> Vec<u32> {
        self.investment_requests
            .lock()
            .unwrap()
            .iter()
            .map(|(_, _, offset)| *offset)
            .collect()
    }

    pub fn investment_windows(&self) -> Vec<(NaiveDate, NaiveDate)> {
        self.investment_requests
            .lock()
            .unwrap()
            .iter()
            .map(|(start, end, _)| (*start, *end))
            .collect()
    }

    pub fn holdings_calls(&self) -> usize {
        *self.holdings_calls.lock().unwrap()
    }
}

#[async_trait]
impl AggregatorApi for ScriptedApi {
    async fn create_link_token(&self, _request: LinkTokenRequest) -> Result<LinkToken> {
        Err(Error::protocol("create_link_token not scripted"))
    }

    async fn exchange_public_token(&self, _public_token: &str) -> Result<TokenExchange> {
        Err(Error::protocol("exchange_public_token not scripted"))
    }

    async fn get_item(&self, _access_token: &AccessToken) -> Result<ItemStatus> {
        Err(Error::protocol("get_item not scripted"))
    }

    async fn remove_item(&self, _access_token: &AccessToken) -> Result<()> {
        Ok(())
    }

    async fn get_accounts(&self, _access_token: &AccessToken) -> Result<Vec<Account>> {
        next(&self.accounts, "get_accounts")
    }

    async fn sync_transactions(
        &self,
        request: &TransactionsSyncRequest<'_>,
    ) -> Result<TransactionsSyncPage> {
        self.sync_requests
            .lock()
            .unwrap()
            .push((request.cursor.map(str::to_string), request.count));
        next(&self.sync_pages, "sync_transactions")
    }

    async fn get_holdings(&self, _access_token: &AccessToken) -> Result<HoldingsPage> {
        *self.holdings_calls.lock().unwrap() += 1;
        next(&self.holdings, "get_holdings")
    }

    async fn get_investment_transactions(
        &self,
        request: &InvestmentTransactionsRequest<'_>,
    ) -> Result<InvestmentTransactionsPage> {
        self.investment_requests.lock().unwrap().push((
            request.start_date,
            request.end_date,
            request.offset,
        ));
        next(&self.investment_pages, "get_investment_transactions")
    }

    async fn get_liabilities(&self, _access_token: &AccessToken) -> Result<Liabilities> {
        next(&self.liabilities, "get_liabilities")
    }

    async fn get_webhook_verification_key(&self, _key_id: &str) -> Result<WebhookVerificationKey> {
        Err(Error::protocol("get_webhook_verification_key not scripted"))
    }

    fn max_history_days(&self) -> i64 {
        self.max_history_days
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Fixtures
// ─────────────────────────────────────────────────────────────────────────────

fn day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
}

pub fn transaction(id: &str) -> Transaction {
    Transaction {
        transaction_id: id.to_string(),
        account_id: "A1".to_string(),
        amount: dec!(12.50),
        iso_currency_code: Some("USD".to_string()),
        unofficial_currency_code: None,
        date: day(),
        authorized_date: None,
        name: format!("Purchase {}", id),
        merchant_name: None,
        pending: false,
        pending_transaction_id: None,
        payment_channel: Some("in store".to_string()),
        personal_finance_category: None,
    }
}

pub fn removed(id: &str) -> RemovedTransaction {
    RemovedTransaction {
        transaction_id: id.to_string(),
        account_id: Some("A1".to_string()),
    }
}

pub fn sync_page(
    added: &[&str],
    modified: &[&str],
    removed_ids: &[&str],
    cursor: &str,
    has_more: bool,
) -> TransactionsSyncPage {
    TransactionsSyncPage {
        added: added.iter().map(|id| transaction(id)).collect(),
        modified: modified.iter().map(|id| transaction(id)).collect(),
        removed: removed_ids.iter().map(|id| removed(id)).collect(),
        next_cursor: cursor.to_string(),
        has_more,
    }
}

pub fn account(id: &str) -> Account {
    Account {
        account_id: id.to_string(),
        name: format!("Brokerage {}", id),
        official_name: None,
        mask: Some("0000".to_string()),
        account_type: "investment".to_string(),
        subtype: Some("brokerage".to_string()),
        balances: AccountBalances {
            current: Some(dec!(1000)),
            iso_currency_code: Some("USD".to_string()),
            ..AccountBalances::default()
        },
    }
}

pub fn security(id: &str) -> Security {
    Security {
        security_id: id.to_string(),
        name: Some(format!("Security {}", id)),
        ticker_symbol: Some(id.to_uppercase()),
        isin: None,
        cusip: None,
        security_type: Some("equity".to_string()),
        is_cash_equivalent: Some(false),
        close_price: Some(dec!(10)),
        close_price_as_of: Some(day()),
        iso_currency_code: Some("USD".to_string()),
        unofficial_currency_code: None,
    }
}

pub fn holding(account_id: &str, security_id: &str) -> Holding {
    Holding {
        account_id: account_id.to_string(),
        security_id: security_id.to_string(),
        quantity: dec!(3),
        cost_basis: Some(dec!(25)),
        institution_price: dec!(10),
        institution_price_as_of: Some(day()),
        institution_value: dec!(30),
        iso_currency_code: Some("USD".to_string()),
        unofficial_currency_code: None,
    }
}

pub fn investment_transaction(
    id: &str,
    account_id: &str,
    security_id: Option<&str>,
) -> InvestmentTransaction {
    InvestmentTransaction {
        investment_transaction_id: id.to_string(),
        account_id: account_id.to_string(),
        security_id: security_id.map(str::to_string),
        date: day(),
        name: format!("Buy {}", id),
        quantity: dec!(1),
        amount: dec!(10),
        price: dec!(10),
        fees: None,
        transaction_type: "buy".to_string(),
        subtype: Some("buy".to_string()),
        iso_currency_code: Some("USD".to_string()),
        unofficial_currency_code: None,
    }
}

pub fn holdings_page(
    holdings: Vec<Holding>,
    securities: Vec<Security>,
    accounts: Vec<Account>,
) -> HoldingsPage {
    HoldingsPage {
        accounts,
        holdings,
        securities,
    }
}

pub fn investment_page(
    investment_transactions: Vec<InvestmentTransaction>,
    securities: Vec<Security>,
    accounts: Vec<Account>,
    total: u32,
) -> InvestmentTransactionsPage {
    InvestmentTransactionsPage {
        accounts,
        investment_transactions,
        securities,
        total_investment_transactions: total,
    }
}
