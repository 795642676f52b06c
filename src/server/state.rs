use anyhow::Result;
use std::sync::Arc;
use tracing::warn;

use crate::backend::{Backend, MemoryBackend, RestBackend};
use crate::config::Config;
use crate::dealership::Dealership;

pub struct AppState {
    pub shop: Dealership,
    pub config: Config,
}

impl AppState {
    pub fn new(config: Config, backend: Arc<dyn Backend>) -> Arc<Self> {
        let shop = Dealership::new(backend, &config);
        Arc::new(Self { shop, config })
    }

    /// Connects to the configured hosted backend, or falls back to demo data
    pub fn from_config(config: Config) -> Result<Arc<Self>> {
        let backend: Arc<dyn Backend> = match &config.baas_url {
            Some(url) => Arc::new(RestBackend::new(url, &config.baas_anon_key)?),
            None => {
                warn!("BAAS_URL not set - serving demo inventory from memory");
                Arc::new(
                    MemoryBackend::demo(&config.vehicles_table, &config.content_table)
                        .with_admin(&config.demo_admin_email, &config.demo_admin_password),
                )
            }
        };

        Ok(Self::new(config, backend))
    }
}
