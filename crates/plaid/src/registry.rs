//! Region-keyed provider clients.
//!
//! One configured client per region, built once at startup and injected into
//! the sync service and webhook verifier.

use std::collections::HashMap;
use std::sync::Arc;

use log::info;

use finlink_core::{Error, Region, Result};

use crate::client::PlaidClient;
use crate::config::PlaidConfig;
use crate::traits::AggregatorApi;

/// Lookup of the provider client that serves each region.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    clients: HashMap<Region, Arc<dyn AggregatorApi>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build HTTP clients for every configured region.
    pub fn from_configs(configs: impl IntoIterator<Item = (Region, PlaidConfig)>) -> Result<Self> {
        let mut registry = Self::new();
        for (region, config) in configs {
            info!(
                "[Plaid] Configuring {} client ({} environment)",
                region, config.environment
            );
            registry = registry.with_client(region, Arc::new(PlaidClient::new(config)?));
        }
        Ok(registry)
    }

    pub fn with_client(mut self, region: Region, client: Arc<dyn AggregatorApi>) -> Self {
        self.clients.insert(region, client);
        self
    }

    /// Client for a region.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when the region has no credentials.
    pub fn for_region(&self, region: Region) -> Result<Arc<dyn AggregatorApi>> {
        self.clients.get(&region).cloned().ok_or_else(|| {
            Error::config(format!("No provider credentials configured for region '{}'", region))
        })
    }

    /// Configured regions, in a stable order.
    pub fn regions(&self) -> Vec<Region> {
        let mut regions: Vec<Region> = self.clients.keys().copied().collect();
        regions.sort_by_key(|r| r.as_str());
        regions
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}
