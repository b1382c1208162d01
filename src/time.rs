//! Timestamp handling
//!
//! All timestamps are naive UTC values at second precision. Callers may pass
//! either a concrete timestamp or a date string; strings are parsed with a
//! small grammar accepting progressively more precise layouts:
//!
//! ```text
//! 2020
//! 2020-05
//! 2020-05-03
//! 2020-05-03 10
//! 2020-05-03 10:15
//! 2020-05-03 10:15:30     (a 'T' may replace the space)
//! ```
//!
//! Missing components default to the start of the period.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Timelike, Utc};
use nom::{
    branch::alt,
    bytes::complete::{tag, take_while_m_n},
    character::complete::{char, multispace1},
    combinator::{all_consuming, map_res, opt},
    sequence::preceded,
    IResult,
};
use serde_json::Value;
use std::str::FromStr;

use crate::error::{CdbError, CdbResult};
use crate::validation;

/// Layout used when timestamps are serialized
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Current UTC time truncated to whole seconds
pub fn now() -> NaiveDateTime {
    truncate_to_seconds(Utc::now().naive_utc())
}

/// Largest representable timestamp, the default end of a validity window
pub fn max_timestamp() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(9999, 12, 31)
        .and_then(|d| d.and_hms_opt(23, 59, 59))
        .unwrap_or(NaiveDateTime::MAX)
}

/// Earliest storable timestamp; years before it have no four-digit form
pub fn min_timestamp() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(0, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or(NaiveDateTime::MIN)
}

/// True when `ts` can be written and read back in the canonical layout
pub fn in_range(ts: &NaiveDateTime) -> bool {
    (min_timestamp()..=max_timestamp()).contains(ts)
}

/// Drop sub-second components
pub fn truncate_to_seconds(ts: NaiveDateTime) -> NaiveDateTime {
    ts.with_nanosecond(0).unwrap_or(ts)
}

/// Render a timestamp in the canonical layout
pub fn format_timestamp(ts: &NaiveDateTime) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

/// Parse a date string in any of the accepted layouts
pub fn parse_timestamp(input: &str) -> CdbResult<NaiveDateTime> {
    let invalid = || CdbError::InvalidFormat {
        input: input.to_string(),
    };

    let (_, parts) = all_consuming(timestamp_parts)(input.trim()).map_err(|_| invalid())?;

    NaiveDate::from_ymd_opt(parts.year, parts.month, parts.day)
        .and_then(|d| d.and_hms_opt(parts.hour, parts.minute, parts.second))
        .ok_or_else(invalid)
}

#[derive(Debug, Clone, Copy)]
struct TimestampParts {
    year: i32,
    month: u32,
    day: u32,
    hour: u32,
    minute: u32,
    second: u32,
}

fn digits<'a, T: FromStr>(min: usize, max: usize) -> impl FnMut(&'a str) -> IResult<&'a str, T> {
    map_res(
        take_while_m_n(min, max, |c: char| c.is_ascii_digit()),
        |s: &'a str| s.parse::<T>(),
    )
}

fn date_time_separator(input: &str) -> IResult<&str, &str> {
    alt((multispace1, tag("T")))(input)
}

/// Each component is only allowed once the previous one is present
fn timestamp_parts(input: &str) -> IResult<&str, TimestampParts> {
    let (input, year) = digits::<i32>(4, 4)(input)?;
    let mut parts = TimestampParts {
        year,
        month: 1,
        day: 1,
        hour: 0,
        minute: 0,
        second: 0,
    };

    let (input, month) = opt(preceded(char('-'), digits::<u32>(1, 2)))(input)?;
    let Some(month) = month else {
        return Ok((input, parts));
    };
    parts.month = month;

    let (input, day) = opt(preceded(char('-'), digits::<u32>(1, 2)))(input)?;
    let Some(day) = day else {
        return Ok((input, parts));
    };
    parts.day = day;

    let (input, hour) = opt(preceded(date_time_separator, digits::<u32>(1, 2)))(input)?;
    let Some(hour) = hour else {
        return Ok((input, parts));
    };
    parts.hour = hour;

    let (input, minute) = opt(preceded(char(':'), digits::<u32>(1, 2)))(input)?;
    let Some(minute) = minute else {
        return Ok((input, parts));
    };
    parts.minute = minute;

    let (input, second) = opt(preceded(char(':'), digits::<u32>(1, 2)))(input)?;
    if let Some(second) = second {
        parts.second = second;
    }

    Ok((input, parts))
}

/// A timestamp argument given either as a concrete time or as a date string
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimeArg {
    At(NaiveDateTime),
    Text(String),
}

impl TimeArg {
    /// Normalize to a second-precision timestamp.
    ///
    /// Concrete times outside years 0000..=9999 are rejected, since they
    /// could be stored but never parsed back.
    pub fn resolve(&self) -> CdbResult<NaiveDateTime> {
        match self {
            TimeArg::At(ts) if !in_range(ts) => Err(CdbError::invalid_value(
                "timestamp",
                format!("{} is outside years 0000..=9999", ts),
            )),
            TimeArg::At(ts) => Ok(truncate_to_seconds(*ts)),
            TimeArg::Text(s) => parse_timestamp(s),
        }
    }

    /// Convert a dynamic value, naming the argument in the error
    pub fn from_value(argument: &str, value: &Value) -> CdbResult<Self> {
        if !validation::is_time_or_string(value) {
            return Err(CdbError::InvalidArgumentType {
                argument: argument.to_string(),
                expected: "timestamp or date string",
            });
        }

        match value {
            Value::String(s) => Ok(TimeArg::Text(s.clone())),
            _ => value
                .as_i64()
                .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
                .map(|dt| TimeArg::At(dt.naive_utc()))
                .ok_or_else(|| CdbError::InvalidArgumentType {
                    argument: argument.to_string(),
                    expected: "timestamp or date string",
                }),
        }
    }
}

/// Resolve an optional argument
pub fn resolve_opt(arg: Option<&TimeArg>) -> CdbResult<Option<NaiveDateTime>> {
    arg.map(TimeArg::resolve).transpose()
}

impl From<NaiveDateTime> for TimeArg {
    fn from(ts: NaiveDateTime) -> Self {
        TimeArg::At(ts)
    }
}

impl From<DateTime<Utc>> for TimeArg {
    fn from(ts: DateTime<Utc>) -> Self {
        TimeArg::At(ts.naive_utc())
    }
}

impl From<&str> for TimeArg {
    fn from(s: &str) -> Self {
        TimeArg::Text(s.to_string())
    }
}

impl From<String> for TimeArg {
    fn from(s: String) -> Self {
        TimeArg::Text(s)
    }
}

impl TryFrom<&Value> for TimeArg {
    type Error = CdbError;

    fn try_from(value: &Value) -> Result<Self, Self::Error> {
        TimeArg::from_value("timestamp", value)
    }
}

/// Serde adapter writing timestamps as `YYYY-MM-DDTHH:MM:SS`
pub mod timestamp_format {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(ts: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&super::format_timestamp(ts))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveDateTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        super::parse_timestamp(&s).map_err(serde::de::Error::custom)
    }
}
