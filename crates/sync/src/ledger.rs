//! Trait for the ledger layer that persists sync results.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use finlink_core::{Item, Result};

use crate::investments::InvestmentsResult;
use crate::transactions::SyncDelta;

/// Persists sync results and per-item sync state.
///
/// Implementations report failures as [`finlink_core::Error::Ledger`].
/// Applying the same delta twice must leave the ledger unchanged, so replays
/// after a lost cursor write are harmless.
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Current state of an item, including the cursor to resume from.
    async fn load_item(&self, item_id: &str) -> Result<Option<Item>>;

    /// Apply added, modified and removed transactions.
    async fn apply_transactions(&self, item: &Item, delta: &SyncDelta) -> Result<()>;

    /// Upsert holdings, investment transactions and securities.
    async fn apply_investments(&self, item: &Item, result: &InvestmentsResult) -> Result<()>;

    /// Persist the cursor to resume from on the next transaction sync.
    async fn update_cursor(&self, item: &Item, cursor: &str) -> Result<()>;

    /// Record when the item last completed a sync.
    async fn mark_synced(&self, item: &Item, at: DateTime<Utc>) -> Result<()>;
}
