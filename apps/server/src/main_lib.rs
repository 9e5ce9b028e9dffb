use std::collections::HashMap;
use std::sync::Arc;

use crate::{
    config::Config,
    jobs::{self, SyncJobQueue, SyncJobRunner},
    store::MemoryStore,
};
use finlink_core::Region;
use finlink_plaid::ProviderRegistry;
use finlink_sync::{Ledger, SyncConfig, SyncService};
use finlink_webhooks::{SyncTrigger, WebhookHandler};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

pub struct AppState {
    pub providers: ProviderRegistry,
    pub sync_service: Arc<SyncService>,
    pub store: Arc<MemoryStore>,
    pub jobs: SyncJobQueue,
    /// One webhook handler per configured region.
    pub webhooks: HashMap<Region, Arc<WebhookHandler>>,
    pub webhook_urls: HashMap<Region, String>,
    pub redirect_url: Option<String>,
}

pub fn init_tracing() {
    let log_format = std::env::var("FINLINK_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    // Library crates log through `log`; the subscriber picks those records up too.
    if log_format.eq_ignore_ascii_case("json") {
        registry
            .with(fmt::layer().json().with_current_span(false))
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(true).with_line_number(true))
            .init();
    }
}

pub async fn build_state(config: &Config) -> anyhow::Result<Arc<AppState>> {
    let providers = ProviderRegistry::from_configs(config.providers.clone())?;
    if providers.is_empty() {
        tracing::warn!("No provider credentials configured; item endpoints will fail");
    }
    build_state_with(config, providers)
}

/// Builds the state around an existing registry and starts the job worker.
pub fn build_state_with(
    config: &Config,
    providers: ProviderRegistry,
) -> anyhow::Result<Arc<AppState>> {
    let store = Arc::new(MemoryStore::new());
    let ledger: Arc<dyn Ledger> = store.clone();
    let sync_service = Arc::new(SyncService::new(
        providers.clone(),
        ledger,
        SyncConfig::default(),
    ));

    let (jobs, rx) = SyncJobQueue::new();
    let runner = Arc::new(SyncJobRunner::new(
        sync_service.clone(),
        &jobs,
        config.job_retry,
    ));
    tokio::spawn(jobs::sync_job_worker(rx, runner));

    let trigger: Arc<dyn SyncTrigger> = Arc::new(jobs.clone());
    let mut webhooks = HashMap::new();
    let mut webhook_urls = HashMap::new();
    for region in providers.regions() {
        let client = providers.for_region(region)?;
        webhooks.insert(region, Arc::new(WebhookHandler::new(client, trigger.clone())));
        if let Some(url) = config.webhook_url_for(region) {
            webhook_urls.insert(region, url);
        }
    }
    tracing::info!(
        "Configured regions: {:?}",
        providers.regions().iter().map(|r| r.as_str()).collect::<Vec<_>>()
    );

    Ok(Arc::new(AppState {
        providers,
        sync_service,
        store,
        jobs,
        webhooks,
        webhook_urls,
        redirect_url: config.redirect_url.clone(),
    }))
}
