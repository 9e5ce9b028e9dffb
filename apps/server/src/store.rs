//! In-memory item store and ledger for the standalone server.
//!
//! Holds linked items with their access tokens and the records applied by
//! sync runs. State lives for the life of the process. Applying the same
//! delta twice leaves the store unchanged.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use finlink_core::{Error, Item, Region, Result};
use finlink_plaid::{Holding, InvestmentTransaction, Security, Transaction};
use finlink_sync::{InvestmentsResult, Ledger, SyncDelta};

#[derive(Default)]
struct ItemRecords {
    transactions: HashMap<String, Transaction>,
    /// Keyed by (account id, security id).
    holdings: HashMap<(String, String), Holding>,
    investment_transactions: HashMap<String, InvestmentTransaction>,
    securities: HashMap<String, Security>,
}

struct StoredItem {
    item: Item,
    records: ItemRecords,
}

/// Public view of an item. Never carries the access token.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemSummary {
    pub id: String,
    pub region: Region,
    pub has_cursor: bool,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub transactions: usize,
    pub holdings: usize,
    pub investment_transactions: usize,
    pub securities: usize,
}

impl From<&StoredItem> for ItemSummary {
    fn from(stored: &StoredItem) -> Self {
        Self {
            id: stored.item.id.clone(),
            region: stored.item.region,
            has_cursor: stored.item.cursor.is_some(),
            last_synced_at: stored.item.last_synced_at,
            transactions: stored.records.transactions.len(),
            holdings: stored.records.holdings.len(),
            investment_transactions: stored.records.investment_transactions.len(),
            securities: stored.records.securities.len(),
        }
    }
}

#[derive(Default)]
pub struct MemoryStore {
    items: RwLock<HashMap<String, StoredItem>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, StoredItem>> {
        self.items.read().unwrap_or_else(|poisoned| {
            tracing::warn!("Item store lock was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, StoredItem>> {
        self.items.write().unwrap_or_else(|poisoned| {
            tracing::warn!("Item store lock was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Insert a newly linked item, replacing any previous link with the same id.
    pub fn insert_item(&self, item: Item) -> ItemSummary {
        let stored = StoredItem {
            item,
            records: ItemRecords::default(),
        };
        let summary = ItemSummary::from(&stored);
        self.write().insert(stored.item.id.clone(), stored);
        summary
    }

    /// Snapshot of an item, including its current cursor.
    pub fn get_item(&self, item_id: &str) -> Option<Item> {
        self.read().get(item_id).map(|stored| stored.item.clone())
    }

    pub fn remove_item(&self, item_id: &str) -> Option<Item> {
        self.write().remove(item_id).map(|stored| stored.item)
    }

    pub fn summary(&self, item_id: &str) -> Option<ItemSummary> {
        self.read().get(item_id).map(ItemSummary::from)
    }

    pub fn summaries(&self) -> Vec<ItemSummary> {
        let mut summaries: Vec<ItemSummary> = self.read().values().map(ItemSummary::from).collect();
        summaries.sort_by(|a, b| a.id.cmp(&b.id));
        summaries
    }

    pub fn item_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn transaction(&self, item_id: &str, transaction_id: &str) -> Option<Transaction> {
        self.read()
            .get(item_id)
            .and_then(|stored| stored.records.transactions.get(transaction_id).cloned())
    }

    fn with_item<T>(&self, item_id: &str, f: impl FnOnce(&mut StoredItem) -> T) -> Result<T> {
        let mut items = self.write();
        let stored = items
            .get_mut(item_id)
            .ok_or_else(|| Error::ledger(format!("Item '{}' is not linked", item_id)))?;
        Ok(f(stored))
    }
}

#[async_trait]
impl Ledger for MemoryStore {
    async fn load_item(&self, item_id: &str) -> Result<Option<Item>> {
        Ok(self.get_item(item_id))
    }

    async fn apply_transactions(&self, item: &Item, delta: &SyncDelta) -> Result<()> {
        self.with_item(&item.id, |stored| {
            let transactions = &mut stored.records.transactions;
            for txn in delta.added.iter().chain(delta.modified.iter()) {
                transactions.insert(txn.transaction_id.clone(), txn.clone());
            }
            for removed in &delta.removed {
                transactions.remove(&removed.transaction_id);
            }
        })
    }

    async fn apply_investments(&self, item: &Item, result: &InvestmentsResult) -> Result<()> {
        self.with_item(&item.id, |stored| {
            let records = &mut stored.records;
            for security in &result.securities {
                records
                    .securities
                    .insert(security.security_id.clone(), Security::clone(security));
            }
            for holding in &result.holdings {
                records.holdings.insert(
                    (holding.account_id.clone(), holding.security_id.clone()),
                    holding.record.clone(),
                );
            }
            for txn in &result.transactions {
                records
                    .investment_transactions
                    .insert(txn.investment_transaction_id.clone(), txn.record.clone());
            }
        })
    }

    async fn update_cursor(&self, item: &Item, cursor: &str) -> Result<()> {
        self.with_item(&item.id, |stored| {
            stored.item.cursor = Some(cursor.to_string());
        })
    }

    async fn mark_synced(&self, item: &Item, at: DateTime<Utc>) -> Result<()> {
        self.with_item(&item.id, |stored| {
            stored.item.last_synced_at = Some(at);
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use finlink_core::AccessToken;
    use finlink_plaid::RemovedTransaction;
    use rust_decimal_macros::dec;

    fn item() -> Item {
        Item::new("item-1", AccessToken::new("access-token"), Region::Us)
    }

    fn transaction(id: &str, name: &str) -> Transaction {
        Transaction {
            transaction_id: id.to_string(),
            account_id: "A1".to_string(),
            amount: dec!(4.20),
            iso_currency_code: Some("USD".to_string()),
            unofficial_currency_code: None,
            date: NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(),
            authorized_date: None,
            name: name.to_string(),
            merchant_name: None,
            pending: false,
            pending_transaction_id: None,
            payment_channel: None,
            personal_finance_category: None,
        }
    }

    fn delta(added: Vec<Transaction>, modified: Vec<Transaction>, removed: &[&str], cursor: &str) -> SyncDelta {
        SyncDelta {
            added,
            modified,
            removed: removed
                .iter()
                .map(|id| RemovedTransaction {
                    transaction_id: id.to_string(),
                    account_id: None,
                })
                .collect(),
            cursor: Some(cursor.to_string()),
        }
    }

    #[tokio::test]
    async fn test_applying_a_delta_twice_is_idempotent() {
        let store = MemoryStore::new();
        store.insert_item(item());

        let d = delta(
            vec![transaction("t1", "Coffee"), transaction("t2", "Lunch")],
            vec![transaction("t1", "Coffee (settled)")],
            &["t2"],
            "c1",
        );
        store.apply_transactions(&item(), &d).await.unwrap();
        store.apply_transactions(&item(), &d).await.unwrap();

        let summary = store.summary("item-1").unwrap();
        assert_eq!(summary.transactions, 1);
        assert_eq!(store.transaction("item-1", "t1").unwrap().name, "Coffee (settled)");
        assert!(store.transaction("item-1", "t2").is_none());
    }

    #[tokio::test]
    async fn test_loaded_item_carries_the_committed_cursor() {
        let store = MemoryStore::new();
        store.insert_item(item());
        store.update_cursor(&item(), "c4").await.unwrap();

        let loaded = store.load_item("item-1").await.unwrap().unwrap();
        assert_eq!(loaded.cursor.as_deref(), Some("c4"));
        assert!(store.load_item("item-9").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_cursor_and_sync_time_are_persisted() {
        let store = MemoryStore::new();
        store.insert_item(item());

        store.update_cursor(&item(), "c9").await.unwrap();
        let now = Utc::now();
        store.mark_synced(&item(), now).await.unwrap();

        let stored = store.get_item("item-1").unwrap();
        assert_eq!(stored.cursor.as_deref(), Some("c9"));
        assert_eq!(stored.last_synced_at, Some(now));
        assert!(store.summary("item-1").unwrap().has_cursor);
    }

    #[tokio::test]
    async fn test_unknown_item_is_a_ledger_error() {
        let store = MemoryStore::new();
        let err = store.update_cursor(&item(), "c1").await.unwrap_err();
        assert!(matches!(err, Error::Ledger(_)));
    }

    #[test]
    fn test_summary_never_exposes_token() {
        let store = MemoryStore::new();
        let summary = store.insert_item(item());
        let json = serde_json::to_string(&summary).unwrap();
        assert!(!json.contains("access-token"));
        assert!(json.contains("\"hasCursor\":false"));
    }
}
