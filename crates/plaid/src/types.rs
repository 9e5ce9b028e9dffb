//! Types for aggregator API requests and responses.
//!
//! These mirror the Plaid JSON payloads. Unknown fields are ignored so that new
//! provider fields never break decoding.

use chrono::{DateTime, NaiveDate, Utc};
use finlink_core::AccessToken;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────────────────────────────────────
// Accounts
// ─────────────────────────────────────────────────────────────────────────────

/// Balance snapshot reported for an account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct AccountBalances {
    pub available: Option<Decimal>,
    pub current: Option<Decimal>,
    pub limit: Option<Decimal>,
    pub iso_currency_code: Option<String>,
    pub unofficial_currency_code: Option<String>,
}

/// An account held at the linked institution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub account_id: String,
    pub name: String,
    #[serde(default)]
    pub official_name: Option<String>,
    #[serde(default)]
    pub mask: Option<String>,
    /// Account type (e.g. "depository", "credit", "loan", "investment")
    #[serde(rename = "type")]
    pub account_type: String,
    #[serde(default)]
    pub subtype: Option<String>,
    #[serde(default)]
    pub balances: AccountBalances,
}

// ─────────────────────────────────────────────────────────────────────────────
// Transactions
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonalFinanceCategory {
    pub primary: String,
    pub detailed: String,
}

/// A cash transaction as reported by the provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub transaction_id: String,
    pub account_id: String,
    /// Positive values are outflows, negative values are inflows.
    pub amount: Decimal,
    #[serde(default)]
    pub iso_currency_code: Option<String>,
    #[serde(default)]
    pub unofficial_currency_code: Option<String>,
    pub date: NaiveDate,
    #[serde(default)]
    pub authorized_date: Option<NaiveDate>,
    pub name: String,
    #[serde(default)]
    pub merchant_name: Option<String>,
    #[serde(default)]
    pub pending: bool,
    #[serde(default)]
    pub pending_transaction_id: Option<String>,
    #[serde(default)]
    pub payment_channel: Option<String>,
    #[serde(default)]
    pub personal_finance_category: Option<PersonalFinanceCategory>,
}

/// Identifier of a transaction the provider no longer reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemovedTransaction {
    pub transaction_id: String,
    #[serde(default)]
    pub account_id: Option<String>,
}

/// Request for one page of the incremental transaction feed.
#[derive(Debug, Clone)]
pub struct TransactionsSyncRequest<'a> {
    pub access_token: &'a AccessToken,
    /// `None` requests the beginning of history.
    pub cursor: Option<&'a str>,
    pub count: Option<u32>,
}

/// One page of the incremental transaction feed.
#[derive(Debug, Clone, Deserialize)]
pub struct TransactionsSyncPage {
    #[serde(default)]
    pub added: Vec<Transaction>,
    #[serde(default)]
    pub modified: Vec<Transaction>,
    #[serde(default)]
    pub removed: Vec<RemovedTransaction>,
    pub next_cursor: String,
    pub has_more: bool,
}

// ─────────────────────────────────────────────────────────────────────────────
// Investments
// ─────────────────────────────────────────────────────────────────────────────

/// A security (stock, fund, cash equivalent) referenced by holdings and
/// investment transactions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Security {
    pub security_id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub ticker_symbol: Option<String>,
    #[serde(default)]
    pub isin: Option<String>,
    #[serde(default)]
    pub cusip: Option<String>,
    #[serde(rename = "type", default)]
    pub security_type: Option<String>,
    #[serde(default)]
    pub is_cash_equivalent: Option<bool>,
    #[serde(default)]
    pub close_price: Option<Decimal>,
    #[serde(default)]
    pub close_price_as_of: Option<NaiveDate>,
    #[serde(default)]
    pub iso_currency_code: Option<String>,
    #[serde(default)]
    pub unofficial_currency_code: Option<String>,
}

/// A position in one security held in one account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Holding {
    pub account_id: String,
    pub security_id: String,
    pub quantity: Decimal,
    #[serde(default)]
    pub cost_basis: Option<Decimal>,
    pub institution_price: Decimal,
    #[serde(default)]
    pub institution_price_as_of: Option<NaiveDate>,
    pub institution_value: Decimal,
    #[serde(default)]
    pub iso_currency_code: Option<String>,
    #[serde(default)]
    pub unofficial_currency_code: Option<String>,
}

/// A buy, sell, dividend, fee or cash movement in an investment account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvestmentTransaction {
    pub investment_transaction_id: String,
    pub account_id: String,
    /// Cash movements carry no security.
    #[serde(default)]
    pub security_id: Option<String>,
    pub date: NaiveDate,
    pub name: String,
    pub quantity: Decimal,
    pub amount: Decimal,
    pub price: Decimal,
    #[serde(default)]
    pub fees: Option<Decimal>,
    #[serde(rename = "type")]
    pub transaction_type: String,
    #[serde(default)]
    pub subtype: Option<String>,
    #[serde(default)]
    pub iso_currency_code: Option<String>,
    #[serde(default)]
    pub unofficial_currency_code: Option<String>,
}

/// Holdings response: holdings plus the accounts and securities they reference.
#[derive(Debug, Clone, Deserialize)]
pub struct HoldingsPage {
    #[serde(default)]
    pub accounts: Vec<Account>,
    #[serde(default)]
    pub holdings: Vec<Holding>,
    #[serde(default)]
    pub securities: Vec<Security>,
}

/// Request for one offset page of investment transactions.
#[derive(Debug, Clone)]
pub struct InvestmentTransactionsRequest<'a> {
    pub access_token: &'a AccessToken,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub offset: u32,
    pub count: u32,
}

/// One offset page of investment transactions.
#[derive(Debug, Clone, Deserialize)]
pub struct InvestmentTransactionsPage {
    #[serde(default)]
    pub accounts: Vec<Account>,
    #[serde(default)]
    pub investment_transactions: Vec<InvestmentTransaction>,
    #[serde(default)]
    pub securities: Vec<Security>,
    pub total_investment_transactions: u32,
}

// ─────────────────────────────────────────────────────────────────────────────
// Liabilities
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Apr {
    pub apr_percentage: Decimal,
    pub apr_type: String,
    #[serde(default)]
    pub balance_subject_to_apr: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreditCardLiability {
    #[serde(default)]
    pub account_id: Option<String>,
    #[serde(default)]
    pub aprs: Vec<Apr>,
    #[serde(default)]
    pub is_overdue: Option<bool>,
    #[serde(default)]
    pub last_payment_amount: Option<Decimal>,
    #[serde(default)]
    pub last_payment_date: Option<NaiveDate>,
    #[serde(default)]
    pub last_statement_balance: Option<Decimal>,
    #[serde(default)]
    pub minimum_payment_amount: Option<Decimal>,
    #[serde(default)]
    pub next_payment_due_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterestRate {
    #[serde(default)]
    pub percentage: Option<Decimal>,
    #[serde(rename = "type", default)]
    pub rate_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MortgageLiability {
    pub account_id: String,
    #[serde(default)]
    pub interest_rate: Option<InterestRate>,
    #[serde(default)]
    pub loan_term: Option<String>,
    #[serde(default)]
    pub maturity_date: Option<NaiveDate>,
    #[serde(default)]
    pub next_monthly_payment: Option<Decimal>,
    #[serde(default)]
    pub origination_date: Option<NaiveDate>,
    #[serde(default)]
    pub origination_principal_amount: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentLoanLiability {
    #[serde(default)]
    pub account_id: Option<String>,
    #[serde(default)]
    pub interest_rate_percentage: Option<Decimal>,
    #[serde(default)]
    pub loan_name: Option<String>,
    #[serde(default)]
    pub minimum_payment_amount: Option<Decimal>,
    #[serde(default)]
    pub next_payment_due_date: Option<NaiveDate>,
    #[serde(default)]
    pub origination_date: Option<NaiveDate>,
    #[serde(default)]
    pub origination_principal_amount: Option<Decimal>,
}

/// Liabilities grouped by product. A missing group is reported as `None`
/// by the provider and decoded as empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Liabilities {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub credit: Vec<CreditCardLiability>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub mortgage: Vec<MortgageLiability>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub student: Vec<StudentLoanLiability>,
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

// ─────────────────────────────────────────────────────────────────────────────
// Items & Link
// ─────────────────────────────────────────────────────────────────────────────

/// Result of exchanging a Link public token. Holds the new secret.
#[derive(Debug, Clone)]
pub struct TokenExchange {
    pub item_id: String,
    pub access_token: AccessToken,
}

/// Error state the provider attaches to an item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemError {
    pub error_type: String,
    pub error_code: String,
    #[serde(default)]
    pub error_message: Option<String>,
}

/// Provider-side metadata for an item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemStatus {
    pub item_id: String,
    #[serde(default)]
    pub institution_id: Option<String>,
    #[serde(default)]
    pub webhook: Option<String>,
    #[serde(default)]
    pub error: Option<ItemError>,
    #[serde(default)]
    pub available_products: Vec<String>,
    #[serde(default)]
    pub billed_products: Vec<String>,
    #[serde(default)]
    pub consent_expiration_time: Option<DateTime<Utc>>,
}

/// A short-lived Link token handed to the client-side Link flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkToken {
    pub link_token: String,
    pub expiration: DateTime<Utc>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Webhook verification keys
// ─────────────────────────────────────────────────────────────────────────────

/// A JSON Web Key used to verify webhook signatures (EC P-256).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookVerificationKey {
    pub kid: String,
    pub alg: String,
    pub kty: String,
    pub crv: String,
    /// Declared key use; only "sig" keys may verify webhooks.
    #[serde(rename = "use")]
    pub key_use: String,
    /// Base64url encoded affine x coordinate.
    pub x: String,
    /// Base64url encoded affine y coordinate.
    pub y: String,
    #[serde(default)]
    pub created_at: Option<i64>,
    /// Unix timestamp after which the key is retired.
    #[serde(default)]
    pub expired_at: Option<i64>,
}
