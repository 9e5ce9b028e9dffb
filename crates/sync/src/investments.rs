//! Offset-paginated investment sync.
//!
//! Holdings come back in a single response. Investment transactions are paged
//! by offset until the accumulated count reaches the total the provider
//! declares. Every record is enriched against the securities and accounts of
//! its own response page.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{Days, NaiveDate, Utc};
use log::{debug, info};

use finlink_core::{Error, Item, Result};
use finlink_plaid::{
    Account, AggregatorApi, Holding, InvestmentTransaction, InvestmentTransactionsRequest,
    Security,
};

use crate::config::SyncConfig;
use crate::cross_reference::{cross_reference, Enriched};

/// Holdings and investment transactions of one item, enriched.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct InvestmentsResult {
    pub holdings: Vec<Enriched<Holding>>,
    pub transactions: Vec<Enriched<InvestmentTransaction>>,
    /// Every security referenced by the result, unique by id, in order of
    /// first appearance.
    pub securities: Vec<Arc<Security>>,
}

/// Accumulates securities across pages, collapsing duplicates by id.
#[derive(Default)]
struct SecuritySet {
    seen: HashSet<String>,
    securities: Vec<Arc<Security>>,
}

impl SecuritySet {
    fn extend(&mut self, securities: &[Arc<Security>]) {
        for security in securities {
            if self.seen.insert(security.security_id.clone()) {
                self.securities.push(Arc::clone(security));
            }
        }
    }

    fn into_vec(self) -> Vec<Arc<Security>> {
        self.securities
    }
}

fn shared<T>(records: Vec<T>) -> Vec<Arc<T>> {
    records.into_iter().map(Arc::new).collect()
}

/// Drives the holdings fetch and the investment transaction pagination loop.
pub struct InvestmentSyncEngine {
    client: Arc<dyn AggregatorApi>,
    config: SyncConfig,
}

impl InvestmentSyncEngine {
    pub fn new(client: Arc<dyn AggregatorApi>, config: SyncConfig) -> Self {
        Self { client, config }
    }

    /// Fetch holdings and investment transactions for an item.
    ///
    /// # Arguments
    ///
    /// * `start_date` - Defaults to today minus the client's history window
    /// * `end_date` - Defaults to today (UTC)
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRequest`] for an inverted date range,
    /// [`Error::UnresolvedReference`] when a record's reference is missing from
    /// its page, and [`Error::Protocol`] when pagination stops making progress.
    pub async fn sync(
        &self,
        item: &Item,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> Result<InvestmentsResult> {
        let (start_date, end_date) = self.resolve_window(start_date, end_date)?;

        let (holdings, holding_securities) = self.fetch_holdings(item).await?;
        let (transactions, transaction_securities) = self
            .fetch_transactions(item, start_date, end_date)
            .await?;

        let mut securities = SecuritySet::default();
        securities.extend(&holding_securities);
        securities.extend(&transaction_securities);
        let securities = securities.into_vec();

        info!(
            "[InvestmentSync] Item {}: {} holdings, {} transactions, {} securities ({} -> {})",
            item.id,
            holdings.len(),
            transactions.len(),
            securities.len(),
            start_date,
            end_date
        );

        Ok(InvestmentsResult {
            holdings,
            transactions,
            securities,
        })
    }

    /// Fetch holdings only, enriched against the same response.
    pub async fn sync_holdings(&self, item: &Item) -> Result<InvestmentsResult> {
        let (holdings, securities) = self.fetch_holdings(item).await?;
        info!(
            "[InvestmentSync] Item {}: {} holdings",
            item.id,
            holdings.len()
        );
        Ok(InvestmentsResult {
            holdings,
            transactions: Vec::new(),
            securities,
        })
    }

    fn resolve_window(
        &self,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> Result<(NaiveDate, NaiveDate)> {
        let today = Utc::now().date_naive();
        let end_date = end_date.unwrap_or(today);
        let start_date = match start_date {
            Some(date) => date,
            None => {
                let history_days = u64::try_from(self.client.max_history_days()).unwrap_or(0);
                today
                    .checked_sub_days(Days::new(history_days))
                    .ok_or_else(|| Error::InvalidRequest("History window out of range".into()))?
            }
        };

        if start_date > end_date {
            return Err(Error::InvalidRequest(format!(
                "Start date {} is after end date {}",
                start_date, end_date
            )));
        }
        Ok((start_date, end_date))
    }

    async fn fetch_holdings(
        &self,
        item: &Item,
    ) -> Result<(Vec<Enriched<Holding>>, Vec<Arc<Security>>)> {
        let page = self.client.get_holdings(&item.access_token).await?;
        let securities = shared(page.securities);
        let accounts: Vec<Arc<Account>> = shared(page.accounts);
        let holdings = cross_reference(page.holdings, &securities, &accounts)?;
        Ok((holdings, securities))
    }

    async fn fetch_transactions(
        &self,
        item: &Item,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<(Vec<Enriched<InvestmentTransaction>>, Vec<Arc<Security>>)> {
        let mut transactions = Vec::new();
        let mut securities = SecuritySet::default();
        let mut offset: u32 = 0;
        let mut pages_fetched: usize = 0;

        loop {
            if pages_fetched >= self.config.max_pages {
                return Err(Error::protocol(format!(
                    "Investment transaction sync for item {} exceeded max pages ({})",
                    item.id, self.config.max_pages
                )));
            }

            let request = InvestmentTransactionsRequest {
                access_token: &item.access_token,
                start_date,
                end_date,
                offset,
                count: self.config.investments_page_size,
            };
            let page = self.client.get_investment_transactions(&request).await?;
            pages_fetched += 1;

            let received = page.investment_transactions.len();
            let total = page.total_investment_transactions as usize;

            let page_securities = shared(page.securities);
            let page_accounts = shared(page.accounts);
            let enriched =
                cross_reference(page.investment_transactions, &page_securities, &page_accounts)?;
            transactions.extend(enriched);
            securities.extend(&page_securities);

            debug!(
                "[InvestmentSync] Item {} offset {}: received {}, accumulated {} of {}",
                item.id,
                offset,
                received,
                transactions.len(),
                total
            );

            if transactions.len() >= total {
                break;
            }
            if received == 0 {
                return Err(Error::protocol(format!(
                    "Investment transaction sync for item {} stalled at {} of {} declared",
                    item.id,
                    transactions.len(),
                    total
                )));
            }

            offset = u32::try_from(transactions.len())
                .map_err(|_| Error::protocol("Investment transaction offset overflow"))?;
        }

        Ok((transactions, securities.into_vec()))
    }
}
