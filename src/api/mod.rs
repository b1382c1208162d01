//! Conditions Database REST API
//!
//! HTTP layer over [`ConditionsDb`](crate::ConditionsDb), built with Axum.
//!
//! # Endpoints
//!
//! ## Detectors
//! - `GET /api/v1/detectors?parent=` - List roots or children
//! - `POST /api/v1/detectors` - Create a detector
//! - `GET /api/v1/detectors/*path` - Get a detector subtree
//! - `DELETE /api/v1/detectors/*path` - Remove a detector subtree
//!
//! ## Conditions
//! - `GET /api/v1/conditions?detector=&name=&tag=&start=&end=&collected_at=`
//! - `POST /api/v1/conditions` - Add a condition
//! - `PATCH /api/v1/conditions` - Update a condition
//!
//! ## Entities (`fills`, `runs`, `files`, `emulsions`, `bricks`)
//! - `GET /api/v1/{kind}?parent=&start=&end=` - List ids
//! - `POST /api/v1/{kind}` - Create
//! - `GET /api/v1/{kind}/:id` - Get
//! - `DELETE /api/v1/{kind}/:id` - Remove
//! - `POST /api/v1/{kind}/:id/attributes` - Add attributes
//!
//! ## Health
//! - `GET /health/live` - Liveness probe
//! - `GET /health/ready` - Readiness probe
//! - `GET /health` - Full health status
//!
//! # Example
//!
//! ```rust,ignore
//! use conddb::api::{serve, AppState};
//! use conddb::{ApiFactory, Config};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load_default();
//!     let db = ApiFactory::construct(&config)?;
//!
//!     let state = AppState::new(db, config.api.clone());
//!     serve(state, &config.api).await?;
//!
//!     Ok(())
//! }
//! ```

pub mod dto;
pub mod error;
pub mod routes;
pub mod state;

pub use error::{ApiError, ApiResult};
pub use state::AppState;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::ApiConfig;
use crate::model::{Brick, Emulsion, File, Fill, Run, TimedEntity};

/// Routes for one entity kind
fn entity_routes<E: TimedEntity + 'static>() -> Router<Arc<AppState>> {
    use routes::entities;

    Router::new()
        .route("/", get(entities::list::<E>).post(entities::create::<E>))
        .route("/:id", get(entities::get::<E>).delete(entities::remove::<E>))
        .route("/:id/attributes", post(entities::add_attributes::<E>))
}

/// Build the API router with all routes and middleware
pub fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        // Detector routes
        .route(
            "/detectors",
            get(routes::detectors::list_detectors).post(routes::detectors::create_detector),
        )
        .route(
            "/detectors/*path",
            get(routes::detectors::get_detector).delete(routes::detectors::delete_detector),
        )
        // Condition routes
        .route(
            "/conditions",
            get(routes::conditions::query_conditions)
                .post(routes::conditions::create_condition)
                .patch(routes::conditions::update_condition),
        )
        // Entity routes
        .nest("/fills", entity_routes::<Fill>())
        .nest("/runs", entity_routes::<Run>())
        .nest("/files", entity_routes::<File>())
        .nest("/emulsions", entity_routes::<Emulsion>())
        .nest("/bricks", entity_routes::<Brick>());

    let health_routes = Router::new()
        .route("/live", get(routes::health::liveness))
        .route("/ready", get(routes::health::readiness))
        .route("/", get(routes::health::full_health));

    let shared_state = Arc::new(state);

    Router::new()
        .nest("/api/v1", api_routes)
        .nest("/health", health_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(shared_state)
}

/// Start the API server
pub async fn serve(state: AppState, config: &ApiConfig) -> Result<(), ApiError> {
    let router = build_router(state);

    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Conditions database API listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| ApiError::Internal(format!("Server error: {}", e)))?;

    tracing::info!("API server shut down gracefully");
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}
