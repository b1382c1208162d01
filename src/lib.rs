//! # conddb
//!
//! Conditions database access layer: hierarchical detector descriptions with
//! time-scoped conditions, plus bookkeeping of accelerator fills, data-taking
//! runs, data files, emulsion targets and bricks.
//!
//! ## Features
//!
//! - **Detector trees**: slash-separated paths, one document per tree,
//!   revision-checked mutation
//! - **Conditions**: named, tagged records with validity windows and
//!   collection dates
//! - **Run bookkeeping**: Fill ─< Run ─< File and Emulsion ─< Brick with
//!   interval nesting and add-if-absent attributes
//! - **Backends**: SQLite (WAL, JSON1) or in-memory
//! - **Access**: library facade, CLI and REST API
//!
//! ## Modules
//!
//! - [`adapter`]: the [`ConditionsDb`] operation facade
//! - [`tree`]: detector path resolution and tree mutation
//! - [`conditions`]: condition insert, update and queries
//! - [`runs`]: the generic fill/run/file/emulsion/brick registry
//! - [`store`]: document store trait and backends
//! - [`api`]: REST API server with Axum
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use conddb::{ApiFactory, Config, NewCondition};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = ApiFactory::construct(&Config::load_default())?;
//!
//!     db.add_detector("SND", None)?;
//!     db.add_detector("MuFilter", Some("SND"))?;
//!     db.add_condition(
//!         "SND/MuFilter",
//!         NewCondition::new("alignment", "v1", serde_json::json!({"dx": 0.12}))
//!             .valid_since("2022-04-01"),
//!     )?;
//!
//!     let hits = db.get_conditions_by_name_and_validity(
//!         "SND/MuFilter",
//!         "alignment",
//!         "2022-07-05 10:00",
//!         None,
//!     )?;
//!     println!("Found {} valid alignment conditions", hits.len());
//!
//!     db.shutdown()?;
//!     Ok(())
//! }
//! ```

pub mod adapter;
pub mod api;
pub mod conditions;
pub mod config;
pub mod error;
pub mod factory;
pub mod logging;
pub mod model;
pub mod runs;
pub mod store;
pub mod time;
pub mod tree;
pub mod validation;

// Re-export top-level types for convenience
pub use adapter::ConditionsDb;

pub use error::{CdbError, CdbResult};

pub use factory::ApiFactory;

pub use config::{ApiConfig, Config, ConfigError, DatabaseConfig, LoggingConfig};

pub use conditions::{ConditionEngine, ConditionUpdate, NewCondition};

pub use model::{
    Attribute, AttributeSet, Brick, BrickAttributes, Condition, Detector, DetectorWrapper,
    Emulsion, EmulsionAttributes, EntityKind, File, FileAttributes, Fill, FillAttributes,
    Interval, Run, RunAttributes, TimeWindow, TimedEntity,
};

pub use runs::Registry;

pub use store::{Collection, DocumentStore, MemoryStore, SqliteStore, StoreError, StoreResult};

pub use time::TimeArg;

pub use tree::{DetectorPath, DetectorTree};

pub use api::{build_router, serve, ApiError, AppState};
