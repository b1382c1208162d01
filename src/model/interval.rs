//! Closed time intervals and list filters

use chrono::NaiveDateTime;

use crate::error::{CdbError, CdbResult};

/// A closed interval `[start, end]` with `start <= end`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Interval {
    /// Start timestamp (inclusive)
    pub start: NaiveDateTime,
    /// End timestamp (inclusive)
    pub end: NaiveDateTime,
}

impl Interval {
    /// Create a new interval, failing if `start > end`
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> CdbResult<Self> {
        if start > end {
            return Err(CdbError::InvalidInterval { start, end });
        }
        Ok(Self { start, end })
    }

    /// Check if a timestamp falls within this interval
    pub fn contains(&self, ts: NaiveDateTime) -> bool {
        self.start <= ts && ts <= self.end
    }

    /// Check if this interval lies inside `parent`.
    ///
    /// Start must be inside the parent and the end must not exceed the
    /// parent's end; together with `start <= end` this is full containment.
    pub fn nests_within(&self, parent: &Interval) -> bool {
        parent.start <= self.start && self.start <= parent.end && self.end <= parent.end
    }

    /// Check if this interval overlaps another
    pub fn overlaps(&self, other: &Interval) -> bool {
        self.start <= other.end && other.start <= self.end
    }

    /// Get interval duration
    pub fn duration(&self) -> chrono::Duration {
        self.end - self.start
    }
}

/// Optional bounds used when listing entities.
///
/// An entity is admitted when it starts at or after `start` and ends at or
/// before `end`. This is containment, not overlap.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: Option<NaiveDateTime>,
    pub end: Option<NaiveDateTime>,
}

impl TimeWindow {
    /// Create a window, failing if both bounds are given and inverted
    pub fn new(start: Option<NaiveDateTime>, end: Option<NaiveDateTime>) -> CdbResult<Self> {
        if let (Some(s), Some(e)) = (start, end) {
            Interval::new(s, e)?;
        }
        Ok(Self { start, end })
    }

    /// A window admitting everything
    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn admits(&self, interval: &Interval) -> bool {
        self.start.map_or(true, |s| s <= interval.start)
            && self.end.map_or(true, |e| interval.end <= e)
    }
}
