//! Input validation and normalization helpers

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::error::{CdbError, CdbResult};
use crate::time;

pub fn is_string(value: &Value) -> bool {
    value.is_string()
}

/// Integer seconds since the Unix epoch, within years 0000..=9999
pub fn is_timestamp(value: &Value) -> bool {
    value
        .as_i64()
        .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
        .map(|dt| time::in_range(&dt.naive_utc()))
        .unwrap_or(false)
}

pub fn is_time_or_string(value: &Value) -> bool {
    is_string(value) || is_timestamp(value)
}

pub fn sanitize_string(s: &str) -> &str {
    s.trim()
}

pub fn sanitize_path(path: &str) -> &str {
    sanitize_string(path).trim_matches('/')
}

/// Split a detector path into its segments.
///
/// Fails on an empty path and on empty segments such as `A//B`.
pub fn split_path(path: &str) -> CdbResult<Vec<String>> {
    let clean = sanitize_path(path);
    if clean.is_empty() {
        return Err(CdbError::InvalidPath {
            path: path.to_string(),
            reason: "path is empty".to_string(),
        });
    }

    clean
        .split('/')
        .map(|segment| {
            let segment = sanitize_string(segment);
            if segment.is_empty() {
                Err(CdbError::InvalidPath {
                    path: path.to_string(),
                    reason: "path contains an empty segment".to_string(),
                })
            } else {
                Ok(segment.to_string())
            }
        })
        .collect()
}

/// Trim `value` and reject it if nothing is left
pub fn require_non_empty(argument: &str, value: &str) -> CdbResult<String> {
    let clean = sanitize_string(value);
    if clean.is_empty() {
        return Err(CdbError::invalid_value(argument, "must not be empty"));
    }
    Ok(clean.to_string())
}

/// Extract a string from a dynamic value, naming the argument on failure
pub fn require_string<'a>(argument: &str, value: &'a Value) -> CdbResult<&'a str> {
    value.as_str().ok_or_else(|| CdbError::InvalidArgumentType {
        argument: argument.to_string(),
        expected: "string",
    })
}
