//! Conditions database error types
//!
//! Every public operation returns [`CdbResult`]. Validation errors are raised
//! before anything is persisted; resolution errors carry the path or id that
//! failed to resolve.

use chrono::NaiveDateTime;
use thiserror::Error;

use crate::store::StoreError;

/// Errors surfaced by the conditions database
#[derive(Error, Debug)]
pub enum CdbError {
    /// Argument has the wrong dynamic type (e.g. a number where a string is required)
    #[error("Invalid argument type for '{argument}': expected {expected}")]
    InvalidArgumentType {
        argument: String,
        expected: &'static str,
    },

    /// Argument has the right type but an unacceptable value
    #[error("Invalid value for '{argument}': {reason}")]
    InvalidValue { argument: String, reason: String },

    /// Date string did not match any accepted layout
    #[error("Invalid date format: '{input}'")]
    InvalidFormat { input: String },

    /// Detector path could not be split into segments
    #[error("Invalid path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    /// Interval start lies after its end
    #[error("Invalid interval: start {start} is after end {end}")]
    InvalidInterval {
        start: NaiveDateTime,
        end: NaiveDateTime,
    },

    /// Child entity interval is not contained in its parent's interval
    #[error("{kind} '{id}' is not within the interval of its parent {parent}")]
    IntervalViolation {
        kind: &'static str,
        id: String,
        parent: String,
    },

    /// Referenced entity does not exist
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// Entity with the same identity already exists
    #[error("{kind} already exists: {id}")]
    AlreadyExists { kind: &'static str, id: String },

    /// Attribute payload is unrecognized or malformed
    #[error("Invalid attribute: {0}")]
    InvalidAttribute(String),

    /// Document kept changing underneath a read-modify-write
    #[error("Concurrent modification of {kind} '{id}'")]
    Conflict { kind: &'static str, id: String },

    /// Document store failure
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl CdbError {
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        CdbError::NotFound {
            kind,
            id: id.into(),
        }
    }

    pub fn already_exists(kind: &'static str, id: impl Into<String>) -> Self {
        CdbError::AlreadyExists {
            kind,
            id: id.into(),
        }
    }

    pub fn invalid_value(argument: impl Into<String>, reason: impl Into<String>) -> Self {
        CdbError::InvalidValue {
            argument: argument.into(),
            reason: reason.into(),
        }
    }

    /// Stable machine-readable code, used by the HTTP layer
    pub fn code(&self) -> &'static str {
        match self {
            CdbError::InvalidArgumentType { .. } => "INVALID_ARGUMENT_TYPE",
            CdbError::InvalidValue { .. } => "INVALID_VALUE",
            CdbError::InvalidFormat { .. } => "INVALID_FORMAT",
            CdbError::InvalidPath { .. } => "INVALID_PATH",
            CdbError::InvalidInterval { .. } => "INVALID_INTERVAL",
            CdbError::IntervalViolation { .. } => "INTERVAL_VIOLATION",
            CdbError::NotFound { .. } => "NOT_FOUND",
            CdbError::AlreadyExists { .. } => "ALREADY_EXISTS",
            CdbError::InvalidAttribute(_) => "INVALID_ATTRIBUTE",
            CdbError::Conflict { .. } => "CONFLICT",
            CdbError::Store(_) => "STORE_ERROR",
        }
    }

    /// True for errors caused by caller input rather than the store
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            CdbError::InvalidArgumentType { .. }
                | CdbError::InvalidValue { .. }
                | CdbError::InvalidFormat { .. }
                | CdbError::InvalidPath { .. }
                | CdbError::InvalidInterval { .. }
                | CdbError::IntervalViolation { .. }
                | CdbError::InvalidAttribute(_)
        )
    }
}

/// Result type alias for conditions database operations
pub type CdbResult<T> = Result<T, CdbError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CdbError::not_found("Detector", "A/B/X");
        assert_eq!(err.to_string(), "Detector not found: A/B/X");

        let err = CdbError::already_exists("Fill", "F1");
        assert_eq!(err.to_string(), "Fill already exists: F1");

        let err = CdbError::InvalidFormat {
            input: "not-a-date".to_string(),
        };
        assert_eq!(err.to_string(), "Invalid date format: 'not-a-date'");
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(CdbError::not_found("Run", "R1").code(), "NOT_FOUND");
        assert_eq!(
            CdbError::InvalidAttribute("bad".into()).code(),
            "INVALID_ATTRIBUTE"
        );
        assert!(CdbError::invalid_value("name", "empty").is_validation());
        assert!(!CdbError::not_found("Run", "R1").is_validation());
    }

    #[test]
    fn test_store_error_conversion() {
        let err: CdbError = StoreError::Closed.into();
        assert!(matches!(err, CdbError::Store(StoreError::Closed)));
    }
}
