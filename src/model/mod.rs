//! Data model
//!
//! Record shapes shared by the tree resolver, the condition engine and the
//! run registry. Everything here serializes to the JSON projection stored in
//! the document store and returned by the API.
//!
//! - [`Detector`] / [`DetectorWrapper`]: hierarchical detector description
//! - [`Condition`]: time-scoped record attached to a detector
//! - [`Fill`], [`Run`], [`File`], [`Emulsion`], [`Brick`]: time-bounded entities
//! - [`Attribute`]: typed value attached to a time-bounded entity

pub mod attribute;
pub mod condition;
pub mod detector;
pub mod entity;
pub mod interval;

pub use attribute::{
    value_kind, Attribute, AttributeSet, BrickAttributes, EmulsionAttributes, FileAttributes,
    FillAttributes, RunAttributes,
};
pub use condition::Condition;
pub use detector::{Detector, DetectorWrapper};
pub use entity::{Brick, Emulsion, EntityKind, File, Fill, Run, TimedEntity};
pub use interval::{Interval, TimeWindow};
