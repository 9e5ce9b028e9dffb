//! Sync service: leases, engines and ledger writes for one item at a time.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use log::{error, info};

use finlink_core::{Error, Item, Result};
use finlink_plaid::{Account, AggregatorApi, Liabilities, ProviderRegistry};

use crate::config::SyncConfig;
use crate::investments::{InvestmentSyncEngine, InvestmentsResult};
use crate::lease::{ItemLease, ItemLeases};
use crate::ledger::Ledger;
use crate::transactions::{SyncDelta, TransactionSyncEngine};

/// Entry point used by the job layer and the HTTP boundary.
///
/// Holds the item's lease for the whole run, reads the item from the ledger
/// once the lease is taken, picks the provider client for its region and
/// writes results back. The cursor is persisted only after the delta has
/// been applied.
pub struct SyncService {
    providers: ProviderRegistry,
    ledger: Arc<dyn Ledger>,
    leases: ItemLeases,
    config: SyncConfig,
}

impl SyncService {
    pub fn new(providers: ProviderRegistry, ledger: Arc<dyn Ledger>, config: SyncConfig) -> Self {
        Self {
            providers,
            ledger,
            leases: ItemLeases::new(),
            config,
        }
    }

    pub fn leases(&self) -> &ItemLeases {
        &self.leases
    }

    /// Take the item's lease, then load the item so its cursor is read under
    /// the lease.
    async fn begin(&self, item_id: &str) -> Result<(ItemLease, Item)> {
        let lease = self
            .leases
            .try_acquire(item_id)
            .ok_or_else(|| Error::SyncInProgress(item_id.to_string()))?;
        let item = self
            .ledger
            .load_item(item_id)
            .await?
            .ok_or_else(|| Error::ItemNotFound(item_id.to_string()))?;
        Ok((lease, item))
    }

    fn client_for(&self, item: &Item) -> Result<Arc<dyn AggregatorApi>> {
        self.providers.for_region(item.region)
    }

    /// Run an incremental transaction sync and commit it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SyncInProgress`] without contacting the provider when
    /// another sync holds the item, and [`Error::ItemNotFound`] when the ledger
    /// does not know it. Engine and ledger errors are returned as-is; on any
    /// error the stored cursor is left untouched.
    pub async fn sync_transactions(&self, item_id: &str) -> Result<SyncDelta> {
        let (_lease, item) = self.begin(item_id).await?;
        let item = &item;
        let engine = TransactionSyncEngine::new(self.client_for(item)?, self.config.clone());

        let delta = engine.sync(item).await.map_err(|e| {
            error!(
                "[SyncService] Transaction sync failed for item {}: {} (retry: {:?})",
                item.id,
                e,
                e.retry_class()
            );
            e
        })?;

        self.ledger.apply_transactions(item, &delta).await?;
        if let Some(cursor) = &delta.cursor {
            self.ledger.update_cursor(item, cursor).await?;
        }
        self.ledger.mark_synced(item, Utc::now()).await?;

        info!(
            "[SyncService] Committed transaction sync for item {} ({} changes)",
            item.id,
            delta.added.len() + delta.modified.len() + delta.removed.len()
        );
        Ok(delta)
    }

    /// Fetch and commit holdings and investment transactions.
    pub async fn sync_investments(
        &self,
        item_id: &str,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> Result<InvestmentsResult> {
        let (_lease, item) = self.begin(item_id).await?;
        let item = &item;
        let engine = InvestmentSyncEngine::new(self.client_for(item)?, self.config.clone());

        let result = engine.sync(item, start_date, end_date).await.map_err(|e| {
            error!(
                "[SyncService] Investment sync failed for item {}: {} (retry: {:?})",
                item.id,
                e,
                e.retry_class()
            );
            e
        })?;

        self.ledger.apply_investments(item, &result).await?;
        self.ledger.mark_synced(item, Utc::now()).await?;
        Ok(result)
    }

    /// Fetch and commit holdings only.
    pub async fn sync_holdings(&self, item_id: &str) -> Result<InvestmentsResult> {
        let (_lease, item) = self.begin(item_id).await?;
        let item = &item;
        let engine = InvestmentSyncEngine::new(self.client_for(item)?, self.config.clone());

        let result = engine.sync_holdings(item).await?;
        self.ledger.apply_investments(item, &result).await?;
        self.ledger.mark_synced(item, Utc::now()).await?;
        Ok(result)
    }

    /// Fetch the item's accounts with their cached balances.
    pub async fn fetch_accounts(&self, item: &Item) -> Result<Vec<Account>> {
        self.client_for(item)?
            .get_accounts(&item.access_token)
            .await
    }

    /// Fetch the item's liabilities.
    pub async fn fetch_liabilities(&self, item: &Item) -> Result<Liabilities> {
        self.client_for(item)?
            .get_liabilities(&item.access_token)
            .await
    }
}
