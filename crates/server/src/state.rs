use std::sync::Arc;
use stashlink_core::{Config, Fetcher, SanitizedConfig};

/// Shared application state
pub struct AppState {
    config: Config,
    fetcher: Arc<Fetcher>,
}

impl AppState {
    pub fn new(config: Config, fetcher: Arc<Fetcher>) -> Self {
        Self { config, fetcher }
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn fetcher(&self) -> &Fetcher {
        self.fetcher.as_ref()
    }
}
