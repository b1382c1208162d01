//! Pure condition queries over a resolved detector

use chrono::NaiveDateTime;

use crate::error::CdbResult;
use crate::model::{Condition, Detector, Interval};

pub fn by_name<'a>(detector: &'a Detector, name: &str) -> Vec<&'a Condition> {
    detector
        .conditions
        .iter()
        .filter(|c| c.name == name)
        .collect()
}

pub fn by_tag<'a>(detector: &'a Detector, tag: &str) -> Vec<&'a Condition> {
    detector
        .conditions
        .iter()
        .filter(|c| c.tag == tag)
        .collect()
}

/// Conditions named `name` whose validity window contains `start` and,
/// when given, also `end`.
///
/// Both bounds must fall inside the same condition's window; a condition
/// that merely overlaps `[start, end]` is not returned.
pub fn by_name_and_validity<'a>(
    detector: &'a Detector,
    name: &str,
    start: NaiveDateTime,
    end: Option<NaiveDateTime>,
) -> CdbResult<Vec<&'a Condition>> {
    if let Some(end) = end {
        Interval::new(start, end)?;
    }

    Ok(detector
        .conditions
        .iter()
        .filter(|c| c.name == name)
        .filter(|c| c.is_valid_at(start) && end.map_or(true, |e| c.is_valid_at(e)))
        .collect())
}

pub fn by_name_and_tag<'a>(detector: &'a Detector, name: &str, tag: &str) -> Option<&'a Condition> {
    detector.conditions.iter().find(|c| c.matches(name, tag))
}

/// First condition named `name` collected at exactly `collected_at`
pub fn by_name_and_collection_date<'a>(
    detector: &'a Detector,
    name: &str,
    collected_at: NaiveDateTime,
) -> Option<&'a Condition> {
    detector
        .conditions
        .iter()
        .find(|c| c.name == name && c.collected_at == collected_at)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CdbError;
    use crate::time::parse_timestamp;
    use serde_json::json;

    fn condition(name: &str, tag: &str, since: &str, until: &str) -> Condition {
        Condition {
            name: name.to_string(),
            tag: tag.to_string(),
            condition_type: None,
            collected_at: parse_timestamp(since).unwrap(),
            valid_since: parse_timestamp(since).unwrap(),
            valid_until: parse_timestamp(until).unwrap(),
            values: json!(1),
        }
    }

    fn detector() -> Detector {
        let mut d = Detector::new("Veto");
        d.conditions = vec![
            condition("gain", "2020", "2020-01-01", "2020-12-31"),
            condition("gain", "2021", "2021-01-01", "2021-12-31"),
            condition("pedestal", "2020", "2020-01-01", "2020-06-30"),
        ];
        d
    }

    fn ts(s: &str) -> NaiveDateTime {
        parse_timestamp(s).unwrap()
    }

    #[test]
    fn test_by_name_and_tag_filters() {
        let d = detector();
        assert_eq!(by_name(&d, "gain").len(), 2);
        assert_eq!(by_tag(&d, "2020").len(), 2);
        assert!(by_name(&d, "noise").is_empty());

        let c = by_name_and_tag(&d, "gain", "2021").unwrap();
        assert_eq!(c.valid_since, ts("2021-01-01"));
        assert!(by_name_and_tag(&d, "gain", "2019").is_none());
    }

    #[test]
    fn test_validity_single_point() {
        let d = detector();

        let hits = by_name_and_validity(&d, "gain", ts("2020-06-01"), None).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].tag, "2020");

        let hits = by_name_and_validity(&d, "pedestal", ts("2021-01-01"), None).unwrap();
        assert!(hits.is_empty());
    }

    #[test]
    fn test_validity_both_bounds_in_same_window() {
        let d = detector();

        let hits =
            by_name_and_validity(&d, "gain", ts("2020-03-01"), Some(ts("2020-04-01"))).unwrap();
        assert_eq!(hits.len(), 1);

        // Spans two conditions: neither contains both bounds
        let hits =
            by_name_and_validity(&d, "gain", ts("2020-12-01"), Some(ts("2021-02-01"))).unwrap();
        assert!(hits.is_empty());
    }

    #[test]
    fn test_validity_inverted_bounds() {
        let d = detector();
        let err = by_name_and_validity(&d, "gain", ts("2021"), Some(ts("2020"))).unwrap_err();
        assert!(matches!(err, CdbError::InvalidInterval { .. }));
    }

    #[test]
    fn test_by_collection_date() {
        let d = detector();
        let c = by_name_and_collection_date(&d, "pedestal", ts("2020-01-01")).unwrap();
        assert_eq!(c.name, "pedestal");
        assert!(by_name_and_collection_date(&d, "pedestal", ts("2020-01-02")).is_none());
    }
}
