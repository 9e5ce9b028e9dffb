//! Finlink Sync - Transaction and investment synchronization engines.
//!
//! This crate drives the provider's pagination protocols and hands complete
//! results to a [`Ledger`]:
//!
//! - [`TransactionSyncEngine`]: cursor-based incremental transaction feed
//! - [`InvestmentSyncEngine`]: holdings plus offset-paginated investment transactions
//! - [`cross_reference`]: enrichment of investment records against their page
//! - [`SyncService`]: per-item leases, region routing and ledger commits

pub mod config;
pub mod cross_reference;
pub mod investments;
pub mod lease;
pub mod ledger;
pub mod service;
pub mod transactions;

#[cfg(test)]
mod test_support;

pub use config::SyncConfig;
pub use cross_reference::{cross_reference, CrossReferenced, Enriched};
pub use investments::{InvestmentSyncEngine, InvestmentsResult};
pub use lease::{ItemLease, ItemLeases};
pub use ledger::Ledger;
pub use service::SyncService;
pub use transactions::{SyncDelta, TransactionSyncEngine};
