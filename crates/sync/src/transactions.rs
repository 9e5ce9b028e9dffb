//! Cursor-based incremental transaction sync.
//!
//! One invocation drains the provider's change feed from the item's cursor to
//! the end, accumulating every page in memory. Nothing is returned until the
//! last page arrives, so a failure part-way never exposes an intermediate
//! cursor.

use std::sync::Arc;

use log::{debug, info};
use serde::Serialize;

use finlink_core::{Error, Item, Result};
use finlink_plaid::{AggregatorApi, RemovedTransaction, Transaction, TransactionsSyncRequest};

use crate::config::SyncConfig;

/// Result of one transaction sync invocation.
///
/// Lists keep provider order across pages. `cursor` resumes the feed after the
/// last delivered change. It is `None` when the provider has not produced a
/// cursor yet (the item's initial pull is still running).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncDelta {
    pub added: Vec<Transaction>,
    pub modified: Vec<Transaction>,
    pub removed: Vec<RemovedTransaction>,
    pub cursor: Option<String>,
}

impl SyncDelta {
    /// Returns true if the feed had no changes since the previous cursor.
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.modified.is_empty() && self.removed.is_empty()
    }
}

/// Drives the incremental sync loop for one item.
pub struct TransactionSyncEngine {
    client: Arc<dyn AggregatorApi>,
    config: SyncConfig,
}

impl TransactionSyncEngine {
    pub fn new(client: Arc<dyn AggregatorApi>, config: SyncConfig) -> Self {
        Self { client, config }
    }

    /// Fetch every page of changes since `item.cursor`.
    ///
    /// The caller must hold exclusive access to the item's cursor for the
    /// duration of the call.
    ///
    /// # Errors
    ///
    /// Any page failure is returned as-is and the accumulated pages are dropped.
    /// Returns [`Error::Protocol`] when the page limit is exceeded, or when the
    /// provider reports more pages with an empty or unchanged cursor.
    pub async fn sync(&self, item: &Item) -> Result<SyncDelta> {
        let mut cursor = item.cursor.clone();
        let mut added = Vec::new();
        let mut modified = Vec::new();
        let mut removed = Vec::new();
        let mut pages_fetched: usize = 0;

        debug!(
            "[TransactionSync] Starting sync for item {} from {}",
            item.id,
            if cursor.is_some() { "saved cursor" } else { "beginning of history" }
        );

        loop {
            if pages_fetched >= self.config.max_pages {
                return Err(Error::protocol(format!(
                    "Transaction sync for item {} exceeded max pages ({})",
                    item.id, self.config.max_pages
                )));
            }

            let request = TransactionsSyncRequest {
                access_token: &item.access_token,
                cursor: cursor.as_deref(),
                count: Some(self.config.transactions_page_size),
            };
            let page = self.client.sync_transactions(&request).await?;
            pages_fetched += 1;

            debug!(
                "[TransactionSync] Item {} page {}: +{} ~{} -{} (has_more={})",
                item.id,
                pages_fetched,
                page.added.len(),
                page.modified.len(),
                page.removed.len(),
                page.has_more
            );

            if page.has_more && page.next_cursor.is_empty() {
                return Err(Error::protocol(format!(
                    "Provider returned an empty cursor with more pages for item {}",
                    item.id
                )));
            }
            if page.has_more && cursor.as_deref() == Some(page.next_cursor.as_str()) {
                return Err(Error::protocol(format!(
                    "Transaction sync for item {} appears stuck (cursor did not advance)",
                    item.id
                )));
            }

            added.extend(page.added);
            modified.extend(page.modified);
            removed.extend(page.removed);

            if !page.has_more {
                if page.next_cursor.is_empty() {
                    info!(
                        "[TransactionSync] Item {} has no cursor yet, initial pull still running",
                        item.id
                    );
                }
                let delta = SyncDelta {
                    added,
                    modified,
                    removed,
                    cursor: Some(page.next_cursor).filter(|c| !c.is_empty()),
                };
                info!(
                    "[TransactionSync] Item {} synced in {} pages: {} added, {} modified, {} removed",
                    item.id,
                    pages_fetched,
                    delta.added.len(),
                    delta.modified.len(),
                    delta.removed.len()
                );
                return Ok(delta);
            }

            cursor = Some(page.next_cursor);
        }
    }
}
