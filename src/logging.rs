//! Tracing subscriber setup for the binaries
//!
//! `RUST_LOG` wins over the configured level when set.

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;

use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry,
};

use crate::config::LoggingConfig;

#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("Invalid log filter: {0}")]
    Filter(#[from] tracing_subscriber::filter::ParseError),

    #[error("Unknown log format: {0} (expected pretty or json)")]
    Format(String),

    #[error("Failed to open log file {path:?}: {error}")]
    File { path: PathBuf, error: String },

    #[error("Logging already initialized: {0}")]
    Init(#[from] tracing_subscriber::util::TryInitError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

impl LogFormat {
    pub fn parse(format: &str) -> Result<Self, LoggingError> {
        match format.trim().to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => Err(LoggingError::Format(other.to_string())),
        }
    }
}

/// Filter directives for a configured level
pub fn filter_directives(level: &str) -> String {
    let level = level.trim();
    format!("conddb={},tower_http={}", level, level)
}

/// Install the global subscriber
pub fn init(config: &LoggingConfig) -> Result<(), LoggingError> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(filter_directives(&config.level)))?;
    let format = LogFormat::parse(&config.format)?;

    let file = match &config.file {
        Some(path) => {
            let path = PathBuf::from(path);
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent).map_err(|e| LoggingError::File {
                    path: path.clone(),
                    error: e.to_string(),
                })?;
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .map_err(|e| LoggingError::File {
                    path,
                    error: e.to_string(),
                })?;
            Some(Mutex::new(file))
        }
        None => None,
    };

    let layer: Box<dyn Layer<Registry> + Send + Sync> = match (format, file) {
        (LogFormat::Json, Some(file)) => fmt::layer().json().with_writer(file).boxed(),
        (LogFormat::Json, None) => fmt::layer().json().boxed(),
        (LogFormat::Pretty, Some(file)) => fmt::layer().with_ansi(false).with_writer(file).boxed(),
        (LogFormat::Pretty, None) => fmt::layer().boxed(),
    };

    tracing_subscriber::registry()
        .with(layer)
        .with(filter)
        .try_init()?;
    Ok(())
}
