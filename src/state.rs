use std::sync::Arc;

use crate::config::Config;
use crate::db::database::Database;
use crate::providers::{FalProvider, ImageProvider, MockProvider};
use crate::storage::StorageBridge;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub db: Database,
    pub storage: StorageBridge,
    pub provider: Arc<dyn ImageProvider>,
}

impl AppState {
    /// Selects the real or mock provider once, at startup, based on whether
    /// an API key is configured.
    pub fn new(config: Config, db: Database) -> Self {
        let provider: Arc<dyn ImageProvider> = if config.is_provider_configured() {
            Arc::new(FalProvider::new(&config))
        } else {
            Arc::new(MockProvider::new(config.mock_delay_ms))
        };
        let storage = StorageBridge::new(&config);

        AppState {
            config: Arc::new(config),
            db,
            storage,
            provider,
        }
    }

    #[cfg(test)]
    pub fn with_provider(mut self, provider: Arc<dyn ImageProvider>) -> Self {
        self.provider = provider;
        self
    }
}
