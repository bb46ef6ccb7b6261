use std::sync::Arc;
use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::config::DatabaseConfig;

use super::memory::MemoryStore;
use super::postgres::PgStore;
use super::store::Store;

/// Errors from the store layer
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Invalid database URL")]
    InvalidDatabaseUrl,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Version conflict on record {0}")]
    VersionConflict(Uuid),

    #[error("Stale write: {0}")]
    Stale(String),

    #[error("Corrupt record: {0}")]
    Corrupt(String),

    #[error(transparent)]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// Builds the process-wide store from configuration
pub struct DatabaseManager;

impl DatabaseManager {
    const MEMORY_SCHEME: &'static str = "memory:";

    /// Open the configured store and apply pending migrations.
    ///
    /// `memory://` selects the in-process store; anything else must be a
    /// Postgres connection string.
    pub async fn connect(config: &DatabaseConfig) -> Result<Arc<dyn Store>, DatabaseError> {
        if config.url.starts_with(Self::MEMORY_SCHEME) {
            tracing::warn!("Using in-memory store, data will not survive a restart");
            return Ok(Arc::new(MemoryStore::new()));
        }

        let store = Self::connect_postgres(config).await?;
        store.migrate().await?;
        Ok(Arc::new(store))
    }

    pub async fn connect_postgres(config: &DatabaseConfig) -> Result<PgStore, DatabaseError> {
        if !Self::is_postgres_url(&config.url) {
            return Err(DatabaseError::InvalidDatabaseUrl);
        }

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connection_timeout))
            .connect(&config.url)
            .await?;

        info!("Created database pool for: {}", config.redacted_url());
        Ok(PgStore::new(pool))
    }

    fn is_postgres_url(raw: &str) -> bool {
        match url::Url::parse(raw) {
            Ok(parsed) => matches!(parsed.scheme(), "postgres" | "postgresql"),
            Err(_) => false,
        }
    }
}
