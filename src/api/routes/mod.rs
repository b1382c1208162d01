//! API Routes
//!
//! Route handlers organized by resource.

pub mod conditions;
pub mod detectors;
pub mod entities;
pub mod health;
