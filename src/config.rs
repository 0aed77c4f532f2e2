use anyhow::Context;
use serde::Deserialize;

use crate::distribution::selection::SelectionStrategy;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Postgres,
    Memory,
}

impl std::str::FromStr for StoreBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "pg" => Ok(Self::Postgres),
            "memory" => Ok(Self::Memory),
            other => anyhow::bail!("unknown STORE_BACKEND {other:?}"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DistributionConfig {
    pub deliveries_per_user: usize,
    pub candidate_pool_size: usize,
    pub strategy: SelectionStrategy,
    /// Hour of day (UTC) for the in-process daily run; `None` disables it.
    pub hour_utc: Option<u8>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub store_backend: StoreBackend,
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub max_diary_chars: usize,
    pub distribution: DistributionConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let store_backend = match std::env::var("STORE_BACKEND") {
            Ok(v) => v.parse()?,
            Err(_) => StoreBackend::Postgres,
        };
        let database_url = std::env::var("DATABASE_URL").ok();
        if store_backend == StoreBackend::Postgres && database_url.is_none() {
            anyhow::bail!("DATABASE_URL is required when STORE_BACKEND=postgres");
        }

        let strategy = match std::env::var("SELECTION_STRATEGY") {
            Ok(v) => v.parse()?,
            Err(_) => SelectionStrategy::Newest,
        };
        let hour_utc = match std::env::var("DISTRIBUTION_HOUR_UTC") {
            Ok(v) => {
                let hour = v
                    .parse::<u8>()
                    .with_context(|| format!("DISTRIBUTION_HOUR_UTC={v:?}"))?;
                anyhow::ensure!(hour < 24, "DISTRIBUTION_HOUR_UTC must be 0-23, got {hour}");
                Some(hour)
            }
            Err(_) => None,
        };

        let distribution = DistributionConfig {
            deliveries_per_user: env_parse("DELIVERIES_PER_USER", 5)?,
            candidate_pool_size: env_parse("CANDIDATE_POOL_SIZE", 100)?,
            strategy,
            hour_utc,
        };

        let config = Self {
            store_backend,
            database_url,
            db_max_connections: env_parse("DB_MAX_CONNECTIONS", 10)?,
            max_diary_chars: env_parse("MAX_DIARY_CHARS", 2000)?,
            distribution,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.distribution.deliveries_per_user > 0,
            "DELIVERIES_PER_USER must be at least 1"
        );
        anyhow::ensure!(
            self.distribution.candidate_pool_size >= self.distribution.deliveries_per_user,
            "CANDIDATE_POOL_SIZE must not be smaller than DELIVERIES_PER_USER"
        );
        anyhow::ensure!(self.db_max_connections > 0, "DB_MAX_CONNECTIONS must be at least 1");
        anyhow::ensure!(self.max_diary_chars > 0, "MAX_DIARY_CHARS must be at least 1");
        Ok(())
    }
}

impl Default for DistributionConfig {
    fn default() -> Self {
        Self {
            deliveries_per_user: 5,
            candidate_pool_size: 100,
            strategy: SelectionStrategy::Newest,
            hour_utc: None,
        }
    }
}

fn env_parse<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    parse_or(key, std::env::var(key).ok(), default)
}

/// An unset variable takes `default`; a set but malformed one is an error.
fn parse_or<T>(key: &str, raw: Option<String>, default: T) -> anyhow::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match raw {
        Some(v) => v.trim().parse::<T>().with_context(|| format!("{key}={v:?}")),
        None => Ok(default),
    }
}
