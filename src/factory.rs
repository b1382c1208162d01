//! Builds a [`ConditionsDb`] from configuration

use std::path::Path;
use std::sync::Arc;

use crate::adapter::ConditionsDb;
use crate::config::{Config, ConfigError};
use crate::store::{DocumentStore, MemoryStore, SqliteStore};

pub struct ApiFactory;

impl ApiFactory {
    /// Open the configured backend and wrap it in a [`ConditionsDb`]
    pub fn construct(config: &Config) -> Result<ConditionsDb, ConfigError> {
        let db = &config.database;
        let store: Arc<dyn DocumentStore> = match db.backend.trim().to_ascii_lowercase().as_str() {
            "sqlite" => Arc::new(SqliteStore::open(&db.sqlite_path())?),
            "memory" => Arc::new(MemoryStore::new()),
            other => return Err(ConfigError::UnsupportedBackend(other.to_string())),
        };

        tracing::info!(
            backend = store.backend(),
            uri = %db.redacted_uri(),
            "Connected to conditions database"
        );
        Ok(ConditionsDb::new(store))
    }

    /// Load the configuration file at `path`, then [`construct`](Self::construct)
    pub fn construct_from_path(path: &Path) -> Result<ConditionsDb, ConfigError> {
        let config = Config::load_with_env(path)?;
        Self::construct(&config)
    }
}
