//! Application State
//!
//! Shared state accessible by all API handlers.
//! Wrapped in Arc for thread-safe sharing across async tasks.

use std::sync::Arc;
use std::time::Instant;

use crate::adapter::ConditionsDb;
use crate::api::error::{ApiError, ApiResult};
use crate::config::ApiConfig;
use crate::error::CdbResult;

/// Shared application state for all handlers
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<ConditionsDb>,
    pub config: Arc<ApiConfig>,
    /// Server start time for uptime tracking
    pub start_time: Instant,
}

impl AppState {
    pub fn new(db: ConditionsDb, config: ApiConfig) -> Self {
        Self {
            db: Arc::new(db),
            config: Arc::new(config),
            start_time: Instant::now(),
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Run a synchronous database operation on the blocking pool
    pub async fn run<T, F>(&self, op: F) -> ApiResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&ConditionsDb) -> CdbResult<T> + Send + 'static,
    {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || op(&db))
            .await
            .map_err(|e| ApiError::Internal(format!("Database task failed: {}", e)))?
            .map_err(ApiError::from)
    }
}
