//! Data Transfer Objects
//!
//! Request and response types for the API endpoints. Detectors, conditions
//! and entities are returned in their stored JSON projection; the types here
//! cover query strings, request bodies and list envelopes.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{CdbError, CdbResult};
use crate::time::TimeArg;

// ============================================
// DETECTOR DTOs
// ============================================

/// Query string for `GET /detectors`
#[derive(Debug, Default, Deserialize)]
pub struct DetectorListQuery {
    /// Parent path; roots are listed when absent
    pub parent: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DetectorListResponse {
    pub detectors: Vec<String>,
    pub total: usize,
}

#[derive(Debug, Deserialize)]
pub struct CreateDetectorRequest {
    pub name: String,
    /// Parent path; a new tree is created when absent
    #[serde(default)]
    pub parent: Option<String>,
}

// ============================================
// CONDITION DTOs
// ============================================

/// Query string for `GET /conditions`
#[derive(Debug, Default, Deserialize)]
pub struct ConditionQuery {
    pub detector: String,
    pub name: Option<String>,
    pub tag: Option<String>,
    /// Validity point, or window start when `end` is given
    pub start: Option<String>,
    pub end: Option<String>,
    pub collected_at: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ConditionListResponse<T> {
    pub conditions: Vec<T>,
    pub total: usize,
}

/// Body of `POST /conditions`
#[derive(Debug, Deserialize)]
pub struct CreateConditionRequest {
    pub detector: String,
    pub name: String,
    pub tag: String,
    pub values: Value,
    #[serde(rename = "type", default)]
    pub condition_type: Option<String>,
    #[serde(default)]
    pub collected_at: Option<Value>,
    #[serde(default)]
    pub valid_since: Option<Value>,
    #[serde(default)]
    pub valid_until: Option<Value>,
}

/// Body of `PATCH /conditions`
#[derive(Debug, Deserialize)]
pub struct UpdateConditionRequest {
    pub detector: String,
    pub name: String,
    pub tag: String,
    #[serde(rename = "type", default)]
    pub condition_type: Option<String>,
    #[serde(default)]
    pub valid_since: Option<Value>,
    #[serde(default)]
    pub valid_until: Option<Value>,
}

/// Convert an optional JSON time argument
pub fn time_arg(argument: &str, value: Option<&Value>) -> CdbResult<Option<TimeArg>> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(value) => TimeArg::from_value(argument, value).map(Some),
    }
}

// ============================================
// ENTITY DTOs
// ============================================

/// Query string for the entity list endpoints
#[derive(Debug, Default, Deserialize)]
pub struct EntityListQuery {
    /// Parent id (fill for runs, run for files, emulsion for bricks)
    pub parent: Option<String>,
    pub start: Option<String>,
    pub end: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct EntityListResponse {
    pub kind: String,
    pub ids: Vec<String>,
    pub total: usize,
}

/// Fetch a required string field from an entity creation body
pub fn required_str<'a>(
    body: &'a serde_json::Map<String, Value>,
    field: &str,
) -> CdbResult<&'a str> {
    match body.get(field) {
        Some(Value::String(s)) => Ok(s),
        Some(_) => Err(CdbError::InvalidArgumentType {
            argument: field.to_string(),
            expected: "string",
        }),
        None => Err(CdbError::invalid_value(field, "is required")),
    }
}

// ============================================
// HEALTH DTOs
// ============================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub backend: String,
    pub database: String,
    pub uptime_seconds: u64,
    pub version: String,
}
