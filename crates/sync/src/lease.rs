//! Per-item exclusive sync leases.
//!
//! At most one sync may run for an item at a time, since the cursor it reads
//! and the cursor it writes must not interleave with another run. Leases are
//! in-memory and scoped to the process.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use log::{debug, warn};

/// Registry of items that currently have a sync running.
#[derive(Clone, Default)]
pub struct ItemLeases {
    held: Arc<Mutex<HashSet<String>>>,
}

impl ItemLeases {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_held(held: &Mutex<HashSet<String>>) -> MutexGuard<'_, HashSet<String>> {
        held.lock().unwrap_or_else(|poisoned| {
            warn!("[ItemLeases] Lease mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Take the lease for an item, or `None` if another sync holds it.
    ///
    /// The lease is released when the returned guard is dropped, including
    /// when the owning future is cancelled.
    pub fn try_acquire(&self, item_id: &str) -> Option<ItemLease> {
        let mut held = Self::lock_held(&self.held);
        if !held.insert(item_id.to_string()) {
            debug!("[ItemLeases] Lease for item {} is busy", item_id);
            return None;
        }
        Some(ItemLease {
            item_id: item_id.to_string(),
            held: Arc::clone(&self.held),
        })
    }

    pub fn is_held(&self, item_id: &str) -> bool {
        Self::lock_held(&self.held).contains(item_id)
    }
}

/// Guard for an acquired lease.
#[derive(Debug)]
pub struct ItemLease {
    item_id: String,
    held: Arc<Mutex<HashSet<String>>>,
}

impl ItemLease {
    pub fn item_id(&self) -> &str {
        &self.item_id
    }
}

impl Drop for ItemLease {
    fn drop(&mut self) {
        ItemLeases::lock_held(&self.held).remove(&self.item_id);
    }
}
