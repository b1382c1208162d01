//! Conditions Database API Server
//!
//! Run with: cargo run --bin conddb-api [-- path/to/config.toml]
//!
//! # Configuration
//!
//! Without a path the config is looked up in the standard locations
//! (`~/.config/conddb/config.toml`, `/etc/conddb/config.toml`,
//! `./config.toml`). `CONDDB_*` environment variables override file values;
//! `RUST_LOG` overrides the configured log level.

use anyhow::Result;
use std::path::PathBuf;

use conddb::api::{serve, AppState};
use conddb::{logging, ApiFactory, Config};

#[tokio::main]
async fn main() -> Result<()> {
    let config = match std::env::args_os().nth(1).map(PathBuf::from) {
        Some(path) => Config::load_with_env(&path)?,
        None => Config::load_default(),
    };
    logging::init(&config.logging)?;

    tracing::info!("Starting conddb API server v{}", env!("CARGO_PKG_VERSION"));

    let db = ApiFactory::construct(&config)?;
    let state = AppState::new(db, config.api.clone());
    let db = state.db.clone();

    serve(state, &config.api).await?;

    tracing::info!("Closing database...");
    db.shutdown()?;
    tracing::info!("conddb API server stopped");

    Ok(())
}
