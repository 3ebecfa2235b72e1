//! Store selection and engine wiring.

use std::sync::Arc;

use shopdesk_infra::{EngineConfig, InMemoryOrderStore, OrderEngine, OrderStore, PostgresOrderStore, StoreError};

use crate::config::ApiConfig;

/// Services shared by every handler.
pub struct AppServices {
    pub engine: OrderEngine,
}

impl AppServices {
    pub fn new(store: Arc<dyn OrderStore>, config: EngineConfig) -> Self {
        Self {
            engine: OrderEngine::new(store, config),
        }
    }

    /// Engine over a fresh in-memory store.
    pub fn in_memory(config: EngineConfig) -> Self {
        Self::new(Arc::new(InMemoryOrderStore::new()), config)
    }
}

/// Postgres when `DATABASE_URL` is configured, in-memory otherwise.
pub async fn build_services(config: &ApiConfig) -> Result<AppServices, StoreError> {
    let store: Arc<dyn OrderStore> = match &config.database_url {
        Some(url) => {
            let store = PostgresOrderStore::connect(url).await?;
            tracing::info!("using postgres order store");
            Arc::new(store)
        }
        None => {
            tracing::warn!("DATABASE_URL not set; orders are kept in memory only");
            Arc::new(InMemoryOrderStore::new())
        }
    };

    Ok(AppServices::new(store, config.engine.clone()))
}
