//! Link token request building.
//!
//! Normalizes the caller's country, language and account kind into values the
//! provider accepts before a Link session is created.

use serde::{Deserialize, Serialize};

/// Country codes the provider can link institutions in.
pub const SUPPORTED_COUNTRY_CODES: &[&str] = &[
    "US", "GB", "ES", "NL", "FR", "IE", "CA", "DE", "IT", "PL", "DK", "NO", "SE", "EE", "LT",
    "LV", "PT", "BE",
];

/// Languages the Link UI is localized in.
pub const SUPPORTED_LANGUAGES: &[&str] = &[
    "da", "nl", "en", "et", "fr", "de", "hi", "it", "lv", "lt", "no", "pl", "pt", "ro", "es",
    "sv", "vi",
];

const DEFAULT_COUNTRY_CODE: &str = "US";
const DEFAULT_LANGUAGE: &str = "en";

/// Kind of local account the user is about to link.
///
/// Drives which provider product is requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountKind {
    Depository,
    Investment,
    CreditCard,
    Loan,
}

impl AccountKind {
    /// Products to request for this kind of account.
    pub fn products(&self) -> Vec<&'static str> {
        match self {
            AccountKind::Investment => vec!["investments"],
            AccountKind::CreditCard | AccountKind::Loan => vec!["liabilities"],
            AccountKind::Depository => vec!["transactions"],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LinkUser {
    pub client_user_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LinkTransactionsOptions {
    pub days_requested: i64,
}

/// Body of a Link token creation request.
///
/// Built with [`LinkTokenRequest::for_user`]; the client fills in `client_name`
/// and `days_requested` from its configuration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LinkTokenRequest {
    pub client_name: String,
    pub user: LinkUser,
    pub products: Vec<&'static str>,
    pub country_codes: Vec<String>,
    pub language: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub webhook: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect_uri: Option<String>,
    pub transactions: LinkTransactionsOptions,
}

impl LinkTokenRequest {
    /// Build a request for a user, normalizing country and locale.
    ///
    /// # Arguments
    ///
    /// * `user_id` - Stable local identifier of the user
    /// * `country` - ISO country code; unsupported codes fall back to "US"
    /// * `locale` - Locale such as "fr-CA"; unsupported languages fall back to "en"
    /// * `kind` - Kind of account being linked, `None` for cash accounts
    pub fn for_user(
        user_id: impl Into<String>,
        country: &str,
        locale: &str,
        kind: Option<AccountKind>,
    ) -> Self {
        Self {
            client_name: String::new(),
            user: LinkUser {
                client_user_id: user_id.into(),
            },
            products: kind.unwrap_or(AccountKind::Depository).products(),
            country_codes: vec![normalize_country_code(country)],
            language: normalize_language(locale),
            webhook: None,
            redirect_uri: None,
            transactions: LinkTransactionsOptions { days_requested: 0 },
        }
    }

    pub fn with_webhook(mut self, url: impl Into<String>) -> Self {
        self.webhook = Some(url.into());
        self
    }

    pub fn with_redirect_uri(mut self, url: impl Into<String>) -> Self {
        self.redirect_uri = Some(url.into());
        self
    }
}

/// Returns the country code if supported, otherwise "US".
pub fn normalize_country_code(country: &str) -> String {
    let upper = country.trim().to_ascii_uppercase();
    if SUPPORTED_COUNTRY_CODES.contains(&upper.as_str()) {
        upper
    } else {
        DEFAULT_COUNTRY_CODE.to_string()
    }
}

/// Returns the language part of a locale if supported, otherwise "en".
pub fn normalize_language(locale: &str) -> String {
    let language = locale
        .split(['-', '_'])
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    if SUPPORTED_LANGUAGES.contains(&language.as_str()) {
        language
    } else {
        DEFAULT_LANGUAGE.to_string()
    }
}
