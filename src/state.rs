use std::sync::Arc;

use crate::config::{AppConfig, StoreBackend};
use crate::inventory::InventoryLedger;
use crate::store::{Directory, MemoryStore, PgStore, PickupStore};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub directory: Arc<dyn Directory>,
    pub ledger: Arc<dyn InventoryLedger>,
    pub pickups: Arc<dyn PickupStore>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        match config.store {
            StoreBackend::Postgres => {
                let db = crate::db::connect(&config).await?;
                Ok(Self::from_store(config, Arc::new(PgStore::new(db))))
            }
            StoreBackend::Memory => {
                tracing::warn!("using in-memory store; data is lost on restart");
                Ok(Self::from_store(config, Arc::new(MemoryStore::new())))
            }
        }
    }

    /// Wires one backend into all three capabilities.
    pub fn from_store<S>(config: Arc<AppConfig>, store: Arc<S>) -> Self
    where
        S: Directory + InventoryLedger + PickupStore + 'static,
    {
        Self {
            config,
            directory: store.clone(),
            ledger: store.clone(),
            pickups: store,
        }
    }

    pub fn in_memory() -> Self {
        Self::from_store(
            Arc::new(AppConfig::in_memory()),
            Arc::new(MemoryStore::new()),
        )
    }
}
