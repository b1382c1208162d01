//! Condition records

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::model::Interval;
use crate::time::timestamp_format;

/// A named, tagged, time-scoped record attached to a detector
///
/// `(name, tag)` is unique within a detector. The validity window
/// `[valid_since, valid_until]` is closed on both ends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub name: String,
    pub tag: String,
    #[serde(rename = "type", default)]
    pub condition_type: Option<String>,
    #[serde(with = "timestamp_format")]
    pub collected_at: NaiveDateTime,
    #[serde(with = "timestamp_format")]
    pub valid_since: NaiveDateTime,
    #[serde(with = "timestamp_format")]
    pub valid_until: NaiveDateTime,
    pub values: Value,
}

impl Condition {
    /// The validity window as an interval
    pub fn validity(&self) -> Interval {
        Interval {
            start: self.valid_since,
            end: self.valid_until,
        }
    }

    /// Check if the condition applies at `ts`
    pub fn is_valid_at(&self, ts: NaiveDateTime) -> bool {
        self.validity().contains(ts)
    }

    pub fn matches(&self, name: &str, tag: &str) -> bool {
        self.name == name && self.tag == tag
    }
}
