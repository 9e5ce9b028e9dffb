//! Background sync jobs.
//!
//! Webhooks and the scheduler enqueue jobs on an unbounded channel. The worker
//! runs each job on its own task, so a slow item never holds up the others.
//! Jobs for one item never overlap: a trigger that arrives while the item is
//! syncing is folded into a single follow-up run once the current run ends.
//! Transient failures are requeued with exponential backoff.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use finlink_core::{Error, RetryClass};
use finlink_sync::SyncService;
use finlink_webhooks::{SyncKind, SyncTrigger};

/// Upper bound for a single retry delay.
const MAX_RETRY_DELAY: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncJob {
    pub item_id: String,
    pub kind: SyncKind,
    /// Failed attempts before this one.
    pub attempt: u32,
}

impl SyncJob {
    pub fn new(item_id: impl Into<String>, kind: SyncKind) -> Self {
        Self {
            item_id: item_id.into(),
            kind,
            attempt: 0,
        }
    }

    fn retry(&self) -> Self {
        Self {
            attempt: self.attempt + 1,
            ..self.clone()
        }
    }
}

/// Backoff for jobs that failed with a transient error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Delay before the first retry. Each further retry doubles it.
    pub base_delay: Duration,
    /// Retries allowed after the first attempt.
    pub max_retries: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(2),
            max_retries: 5,
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt`, counting from 1.
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(MAX_RETRY_DELAY)
    }
}

/// Sender side of the job channel.
#[derive(Clone)]
pub struct SyncJobQueue {
    tx: mpsc::UnboundedSender<SyncJob>,
}

impl SyncJobQueue {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<SyncJob>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn enqueue(&self, item_id: &str, kind: SyncKind) -> finlink_core::Result<()> {
        self.tx
            .send(SyncJob::new(item_id, kind))
            .map_err(|_| Error::ledger("Sync job queue is closed"))
    }
}

#[async_trait]
impl SyncTrigger for SyncJobQueue {
    async fn trigger(&self, item_id: &str, kind: SyncKind) -> finlink_core::Result<()> {
        self.enqueue(item_id, kind)
    }
}

/// Runs jobs with per-item coalescing and retries.
pub struct SyncJobRunner {
    service: Arc<SyncService>,
    /// Weak, so the worker still stops once every queue handle is gone.
    requeue: mpsc::WeakUnboundedSender<SyncJob>,
    retry: RetryPolicy,
    /// Items with a job running, and the kinds triggered for them meanwhile.
    running: Mutex<HashMap<String, HashSet<SyncKind>>>,
}

impl SyncJobRunner {
    pub fn new(service: Arc<SyncService>, queue: &SyncJobQueue, retry: RetryPolicy) -> Self {
        Self {
            service,
            requeue: queue.tx.downgrade(),
            retry,
            running: Mutex::new(HashMap::new()),
        }
    }

    fn lock_running(&self) -> MutexGuard<'_, HashMap<String, HashSet<SyncKind>>> {
        self.running.lock().unwrap_or_else(|poisoned| {
            warn!("Sync job registry lock was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Run a job, or fold it into the run already in progress for its item.
    pub async fn run(&self, job: SyncJob) {
        if !self.claim(&job) {
            debug!(
                "{} sync for item {} folded into the running job",
                job.kind, job.item_id
            );
            return;
        }

        let mut next = Some(job);
        while let Some(job) = next {
            self.execute(&job).await;
            next = self.next_pending(&job.item_id);
        }
    }

    fn claim(&self, job: &SyncJob) -> bool {
        let mut running = self.lock_running();
        match running.get_mut(&job.item_id) {
            Some(pending) => {
                pending.insert(job.kind);
                false
            }
            None => {
                running.insert(job.item_id.clone(), HashSet::new());
                true
            }
        }
    }

    /// Take one kind triggered during the last run, or release the item.
    fn next_pending(&self, item_id: &str) -> Option<SyncJob> {
        let mut running = self.lock_running();
        let pending = running.get_mut(item_id)?;
        match pending.iter().next().copied() {
            Some(kind) => {
                pending.remove(&kind);
                Some(SyncJob::new(item_id, kind))
            }
            None => {
                running.remove(item_id);
                None
            }
        }
    }

    async fn execute(&self, job: &SyncJob) {
        let service = &self.service;
        let result = match job.kind {
            SyncKind::Transactions => service.sync_transactions(&job.item_id).await.map(|delta| {
                format!(
                    "{} added, {} modified, {} removed",
                    delta.added.len(),
                    delta.modified.len(),
                    delta.removed.len()
                )
            }),
            SyncKind::Investments => service
                .sync_investments(&job.item_id, None, None)
                .await
                .map(|result| {
                    format!(
                        "{} holdings, {} transactions",
                        result.holdings.len(),
                        result.transactions.len()
                    )
                }),
            SyncKind::Holdings => service
                .sync_holdings(&job.item_id)
                .await
                .map(|result| format!("{} holdings", result.holdings.len())),
        };

        match result {
            Ok(summary) => info!(
                "{} sync for item {} finished: {}",
                job.kind, job.item_id, summary
            ),
            Err(Error::ItemNotFound(_)) => {
                warn!("Skipping {} sync for unknown item {}", job.kind, job.item_id)
            }
            Err(e) if e.requires_relink() => {
                warn!("Item {} needs to be re-linked: {}", job.item_id, e)
            }
            Err(e) if e.retry_class() == RetryClass::WithBackoff => self.schedule_retry(job, &e),
            Err(e) => warn!("{} sync for item {} failed: {}", job.kind, job.item_id, e),
        }
    }

    fn schedule_retry(&self, job: &SyncJob, error: &Error) {
        if job.attempt >= self.retry.max_retries {
            warn!(
                "{} sync for item {} failed after {} attempts, giving up: {}",
                job.kind,
                job.item_id,
                job.attempt + 1,
                error
            );
            return;
        }

        let retry = job.retry();
        let delay = self.retry.delay(retry.attempt);
        warn!(
            "{} sync for item {} failed, retry {} in {:?}: {}",
            job.kind, job.item_id, retry.attempt, delay, error
        );

        let requeue = self.requeue.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let Some(tx) = requeue.upgrade() else {
                debug!("Sync job queue closed, dropping retry for item {}", retry.item_id);
                return;
            };
            if tx.send(retry).is_err() {
                debug!("Sync job worker stopped before a retry could be queued");
            }
        });
    }
}

/// Receives jobs until every queue handle is dropped.
pub async fn sync_job_worker(mut rx: mpsc::UnboundedReceiver<SyncJob>, runner: Arc<SyncJobRunner>) {
    info!("Sync job worker started");
    while let Some(job) = rx.recv().await {
        let runner = runner.clone();
        tokio::spawn(async move {
            runner.run(job).await;
        });
    }
    info!("Sync job worker shutting down");
}
