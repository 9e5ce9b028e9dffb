//! Background scheduler for periodic transaction sync.
//!
//! Webhooks drive most syncs. The scheduler is a safety net for missed
//! deliveries and enqueues a transaction sync for every linked item.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::interval;
use tracing::{debug, info, warn};

use finlink_webhooks::SyncKind;

use crate::jobs::SyncJobQueue;
use crate::store::MemoryStore;

/// Starts the scheduler. The first run happens one interval after startup.
pub fn start_sync_scheduler(queue: SyncJobQueue, store: Arc<MemoryStore>, every: Duration) {
    tokio::spawn(async move {
        info!("Sync scheduler started ({}s interval)", every.as_secs());

        let mut ticks = interval(every);
        // The first tick completes immediately.
        ticks.tick().await;

        loop {
            ticks.tick().await;
            if !enqueue_all(&queue, &store) {
                return;
            }
        }
    });
}

/// Returns false once the job queue is closed.
fn enqueue_all(queue: &SyncJobQueue, store: &MemoryStore) -> bool {
    let item_ids = store.item_ids();
    debug!("Scheduling transaction sync for {} items", item_ids.len());
    for item_id in item_ids {
        if let Err(e) = queue.enqueue(&item_id, SyncKind::Transactions) {
            warn!("Sync scheduler stopping: {}", e);
            return false;
        }
    }
    true
}
