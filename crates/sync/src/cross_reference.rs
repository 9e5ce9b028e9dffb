//! Cross-referencing of investment records against their response page.
//!
//! Holdings and investment transactions carry security and account ids. The
//! provider returns the referenced securities and accounts in the same
//! response, so each record is wrapped in an [`Enriched`] composite holding
//! shared references to them. Provider records are never mutated.

use std::collections::HashMap;
use std::ops::Deref;
use std::sync::Arc;

use finlink_core::{Error, ReferenceKind, Result};
use finlink_plaid::{Account, Holding, InvestmentTransaction, Security};

/// A record whose account and security ids must resolve within its page.
pub trait CrossReferenced {
    /// Identifier used in error messages.
    fn record_label(&self) -> String;

    fn account_id(&self) -> &str;

    /// `None` when the record carries no security (e.g. cash movements).
    fn security_id(&self) -> Option<&str>;
}

impl CrossReferenced for Holding {
    fn record_label(&self) -> String {
        format!("holding {}/{}", self.account_id, self.security_id)
    }

    fn account_id(&self) -> &str {
        &self.account_id
    }

    fn security_id(&self) -> Option<&str> {
        Some(&self.security_id)
    }
}

impl CrossReferenced for InvestmentTransaction {
    fn record_label(&self) -> String {
        self.investment_transaction_id.clone()
    }

    fn account_id(&self) -> &str {
        &self.account_id
    }

    fn security_id(&self) -> Option<&str> {
        self.security_id.as_deref()
    }
}

/// A provider record plus its resolved references.
///
/// The references are shared with the rest of the result; the record does not
/// own them.
#[derive(Debug, Clone, PartialEq)]
pub struct Enriched<T> {
    pub record: T,
    pub account: Arc<Account>,
    pub security: Option<Arc<Security>>,
}

impl<T> Deref for Enriched<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.record
    }
}

/// Attach resolved security and account references to every record.
///
/// # Errors
///
/// Returns [`Error::UnresolvedReference`] for the first record whose account id,
/// or non-null security id, has no entry in the given page.
pub fn cross_reference<T: CrossReferenced>(
    records: Vec<T>,
    securities: &[Arc<Security>],
    accounts: &[Arc<Account>],
) -> Result<Vec<Enriched<T>>> {
    let securities_by_id: HashMap<&str, &Arc<Security>> = securities
        .iter()
        .map(|s| (s.security_id.as_str(), s))
        .collect();
    let accounts_by_id: HashMap<&str, &Arc<Account>> = accounts
        .iter()
        .map(|a| (a.account_id.as_str(), a))
        .collect();

    records
        .into_iter()
        .map(|record| {
            let account = accounts_by_id
                .get(record.account_id())
                .copied()
                .cloned()
                .ok_or_else(|| Error::UnresolvedReference {
                    kind: ReferenceKind::Account,
                    record_id: record.record_label(),
                    reference_id: record.account_id().to_string(),
                })?;

            let security = match record.security_id() {
                None => None,
                Some(security_id) => Some(
                    securities_by_id
                        .get(security_id)
                        .copied()
                        .cloned()
                        .ok_or_else(|| Error::UnresolvedReference {
                            kind: ReferenceKind::Security,
                            record_id: record.record_label(),
                            reference_id: security_id.to_string(),
                        })?,
                ),
            };

            Ok(Enriched {
                record,
                account,
                security,
            })
        })
        .collect()
}
