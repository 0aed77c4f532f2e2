use crate::config::{AppConfig, StoreBackend};
use crate::distribution::SelectionPolicy;
use crate::store::{DiaryStore, MemoryStore, PgStore};
use anyhow::Context;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn DiaryStore>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let store = match config.store_backend {
            StoreBackend::Postgres => {
                let url = config
                    .database_url
                    .as_deref()
                    .context("DATABASE_URL is not set")?;
                let pg = PgStore::connect(url, config.db_max_connections).await?;
                pg.migrate().await?;
                Arc::new(pg) as Arc<dyn DiaryStore>
            }
            StoreBackend::Memory => {
                warn!("using in-memory store; data is lost on restart");
                Arc::new(MemoryStore::new()) as Arc<dyn DiaryStore>
            }
        };
        info!(backend = ?config.store_backend, "store ready");

        Ok(Self { config, store })
    }

    pub fn from_parts(config: Arc<AppConfig>, store: Arc<dyn DiaryStore>) -> Self {
        Self { config, store }
    }

    pub fn selection_policy(&self) -> SelectionPolicy {
        let d = &self.config.distribution;
        SelectionPolicy::new(d.strategy, d.deliveries_per_user, d.candidate_pool_size)
    }

    /// State backed by a fresh in-memory store, for tests.
    pub fn fake() -> (Self, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let config = Arc::new(AppConfig {
            store_backend: StoreBackend::Memory,
            database_url: None,
            db_max_connections: 1,
            max_diary_chars: 200,
            distribution: Default::default(),
        });
        let state = Self::from_parts(config, store.clone() as Arc<dyn DiaryStore>);
        (state, store)
    }
}
