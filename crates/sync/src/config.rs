/// Configuration for sync operations.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Number of transactions requested per incremental sync page.
    pub transactions_page_size: u32,
    /// Number of investment transactions requested per offset page.
    pub investments_page_size: u32,
    /// Maximum number of pages fetched per invocation (safety limit).
    pub max_pages: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            transactions_page_size: 500,
            investments_page_size: 500,
            max_pages: 10_000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_config_default() {
        let config = SyncConfig::default();
        assert_eq!(config.transactions_page_size, 500);
        assert_eq!(config.investments_page_size, 500);
        assert_eq!(config.max_pages, 10_000);
    }
}
