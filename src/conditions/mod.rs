//! Condition Query Engine
//!
//! Adds, updates and queries the conditions attached to detector nodes.
//! Writes go through [`DetectorTree::modify`], so a condition insert or
//! update rewrites the owning tree document under a revision check.

pub mod query;

use chrono::NaiveDateTime;
use serde_json::Value;

use crate::error::{CdbError, CdbResult};
use crate::model::{Condition, Interval};
use crate::time::{self, TimeArg};
use crate::tree::{DetectorPath, DetectorTree};
use crate::validation::require_non_empty;

/// A condition to be added; unset timestamps default at build time.
///
/// `collected_at` and `valid_since` default to now, `valid_until` to the
/// largest representable timestamp.
#[derive(Debug, Clone)]
pub struct NewCondition {
    pub name: String,
    pub tag: String,
    pub values: Value,
    pub condition_type: Option<String>,
    pub collected_at: Option<TimeArg>,
    pub valid_since: Option<TimeArg>,
    pub valid_until: Option<TimeArg>,
}

impl NewCondition {
    pub fn new(name: impl Into<String>, tag: impl Into<String>, values: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            tag: tag.into(),
            values: values.into(),
            condition_type: None,
            collected_at: None,
            valid_since: None,
            valid_until: None,
        }
    }

    pub fn condition_type(mut self, condition_type: impl Into<String>) -> Self {
        self.condition_type = Some(condition_type.into());
        self
    }

    pub fn collected_at(mut self, at: impl Into<TimeArg>) -> Self {
        self.collected_at = Some(at.into());
        self
    }

    pub fn valid_since(mut self, since: impl Into<TimeArg>) -> Self {
        self.valid_since = Some(since.into());
        self
    }

    pub fn valid_until(mut self, until: impl Into<TimeArg>) -> Self {
        self.valid_until = Some(until.into());
        self
    }

    /// Validate, normalize and apply defaults
    pub fn build(self) -> CdbResult<Condition> {
        let name = require_non_empty("name", &self.name)?;
        let tag = require_non_empty("tag", &self.tag)?;
        if self.values.is_null() {
            return Err(CdbError::invalid_value("values", "must not be empty"));
        }
        let condition_type = match self.condition_type {
            Some(t) => Some(require_non_empty("type", &t)?),
            None => None,
        };

        let now = time::now();
        let collected_at = time::resolve_opt(self.collected_at.as_ref())?.unwrap_or(now);
        let valid_since = time::resolve_opt(self.valid_since.as_ref())?.unwrap_or(now);
        let valid_until =
            time::resolve_opt(self.valid_until.as_ref())?.unwrap_or_else(time::max_timestamp);
        Interval::new(valid_since, valid_until)?;

        Ok(Condition {
            name,
            tag,
            condition_type,
            collected_at,
            valid_since,
            valid_until,
            values: self.values,
        })
    }
}

/// Partial update of an existing condition; unset fields are left alone
#[derive(Debug, Clone, Default)]
pub struct ConditionUpdate {
    pub condition_type: Option<String>,
    pub valid_since: Option<TimeArg>,
    pub valid_until: Option<TimeArg>,
}

impl ConditionUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn condition_type(mut self, condition_type: impl Into<String>) -> Self {
        self.condition_type = Some(condition_type.into());
        self
    }

    pub fn valid_since(mut self, since: impl Into<TimeArg>) -> Self {
        self.valid_since = Some(since.into());
        self
    }

    pub fn valid_until(mut self, until: impl Into<TimeArg>) -> Self {
        self.valid_until = Some(until.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.condition_type.is_none() && self.valid_since.is_none() && self.valid_until.is_none()
    }

    /// Resolve timestamps once so replays of a retried write agree
    fn resolve(&self) -> CdbResult<ResolvedUpdate> {
        let valid_since = time::resolve_opt(self.valid_since.as_ref())?;
        let valid_until = time::resolve_opt(self.valid_until.as_ref())?;
        if let (Some(since), Some(until)) = (valid_since, valid_until) {
            Interval::new(since, until)?;
        }
        let condition_type = match &self.condition_type {
            Some(t) => Some(require_non_empty("type", t)?),
            None => None,
        };
        Ok(ResolvedUpdate {
            condition_type,
            valid_since,
            valid_until,
        })
    }
}

#[derive(Debug, Clone)]
struct ResolvedUpdate {
    condition_type: Option<String>,
    valid_since: Option<NaiveDateTime>,
    valid_until: Option<NaiveDateTime>,
}

impl ResolvedUpdate {
    fn apply(&self, condition: &mut Condition) -> CdbResult<()> {
        let since = self.valid_since.unwrap_or(condition.valid_since);
        let until = self.valid_until.unwrap_or(condition.valid_until);
        // The merged window must stay ordered too
        Interval::new(since, until)?;

        if let Some(t) = &self.condition_type {
            condition.condition_type = Some(t.clone());
        }
        condition.valid_since = since;
        condition.valid_until = until;
        Ok(())
    }
}

/// Condition operations over the detector trees
#[derive(Clone)]
pub struct ConditionEngine {
    tree: DetectorTree,
}

impl ConditionEngine {
    pub fn new(tree: DetectorTree) -> Self {
        Self { tree }
    }

    /// Attach a new condition to the detector at `detector_path`.
    ///
    /// `(name, tag)` must be unused on that detector. `(name, collected_at)`
    /// is not checked: collection dates default to the current second, so
    /// two conditions added back to back may legitimately share one.
    /// [`Self::get_condition_by_name_and_collection_date`] returns the
    /// first match.
    pub fn add_condition(&self, detector_path: &str, new: NewCondition) -> CdbResult<Condition> {
        let path = DetectorPath::parse(detector_path)?;
        let condition = new.build()?;

        self.tree.modify(&path, |node| {
            if query::by_name_and_tag(node, &condition.name, &condition.tag).is_some() {
                return Err(CdbError::already_exists(
                    "Condition",
                    format!("{}:{}@{}", condition.name, condition.tag, path),
                ));
            }
            node.conditions.push(condition.clone());
            Ok(())
        })?;

        tracing::info!(
            detector = %path,
            name = %condition.name,
            tag = %condition.tag,
            "Added condition"
        );
        Ok(condition)
    }

    /// All conditions of a detector, in storage order
    pub fn get_conditions(&self, detector_path: &str) -> CdbResult<Vec<Condition>> {
        Ok(self.tree.get_detector(detector_path)?.conditions)
    }

    pub fn get_conditions_by_name(
        &self,
        detector_path: &str,
        name: &str,
    ) -> CdbResult<Vec<Condition>> {
        let detector = self.tree.get_detector(detector_path)?;
        Ok(query::by_name(&detector, name.trim())
            .into_iter()
            .cloned()
            .collect())
    }

    pub fn get_conditions_by_tag(
        &self,
        detector_path: &str,
        tag: &str,
    ) -> CdbResult<Vec<Condition>> {
        let detector = self.tree.get_detector(detector_path)?;
        Ok(query::by_tag(&detector, tag.trim())
            .into_iter()
            .cloned()
            .collect())
    }

    pub fn get_conditions_by_name_and_validity(
        &self,
        detector_path: &str,
        name: &str,
        start: &TimeArg,
        end: Option<&TimeArg>,
    ) -> CdbResult<Vec<Condition>> {
        let start = start.resolve()?;
        let end = time::resolve_opt(end)?;
        if let Some(end) = end {
            Interval::new(start, end)?;
        }
        let detector = self.tree.get_detector(detector_path)?;

        Ok(query::by_name_and_validity(&detector, name.trim(), start, end)?
            .into_iter()
            .cloned()
            .collect())
    }

    pub fn get_condition_by_name_and_tag(
        &self,
        detector_path: &str,
        name: &str,
        tag: &str,
    ) -> CdbResult<Option<Condition>> {
        let detector = self.tree.get_detector(detector_path)?;
        Ok(query::by_name_and_tag(&detector, name.trim(), tag.trim()).cloned())
    }

    pub fn get_condition_by_name_and_collection_date(
        &self,
        detector_path: &str,
        name: &str,
        collected_at: &TimeArg,
    ) -> CdbResult<Option<Condition>> {
        let collected_at = collected_at.resolve()?;
        let detector = self.tree.get_detector(detector_path)?;
        Ok(query::by_name_and_collection_date(&detector, name.trim(), collected_at).cloned())
    }

    /// Apply a partial update to the condition `(name, tag)`
    pub fn update_condition_by_name_and_tag(
        &self,
        detector_path: &str,
        name: &str,
        tag: &str,
        update: &ConditionUpdate,
    ) -> CdbResult<Condition> {
        let path = DetectorPath::parse(detector_path)?;
        let (name, tag) = (name.trim(), tag.trim());
        let resolved = update.resolve()?;

        let updated = self.tree.modify(&path, |node| {
            let condition = node
                .conditions
                .iter_mut()
                .find(|c| c.matches(name, tag))
                .ok_or_else(|| {
                    CdbError::not_found("Condition", format!("{}:{}@{}", name, tag, path))
                })?;
            resolved.apply(condition)?;
            Ok(condition.clone())
        })?;

        tracing::info!(detector = %path, name, tag, "Updated condition");
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use serde_json::json;
    use std::sync::Arc;

    fn engine() -> ConditionEngine {
        let tree = DetectorTree::new(Arc::new(MemoryStore::new()));
        tree.create_root("SND").unwrap();
        tree.create_child("SND", "Veto").unwrap();
        ConditionEngine::new(tree)
    }

    fn yearly(tag: &str) -> NewCondition {
        NewCondition::new("gain", tag, json!({"ch0": 1.02}))
            .condition_type("calibration")
            .collected_at("2019-12-20")
            .valid_since("2020-01-01")
            .valid_until("2020-12-31 23:59:59")
    }

    #[test]
    fn test_build_defaults() {
        let before = time::now();
        let c = NewCondition::new("gain", "v1", json!(1)).build().unwrap();
        assert!(c.collected_at >= before);
        assert!(c.valid_since >= before);
        assert_eq!(c.valid_until, time::max_timestamp());
        assert_eq!(c.condition_type, None);
    }

    #[test]
    fn test_build_validation() {
        let err = NewCondition::new(" ", "v1", json!(1)).build().unwrap_err();
        assert!(matches!(err, CdbError::InvalidValue { .. }));

        let err = NewCondition::new("gain", "v1", Value::Null).build().unwrap_err();
        assert!(matches!(err, CdbError::InvalidValue { .. }));

        let err = NewCondition::new("gain", "v1", json!(1))
            .valid_since("2021")
            .valid_until("2020")
            .build()
            .unwrap_err();
        assert!(matches!(err, CdbError::InvalidInterval { .. }));

        let err = NewCondition::new("gain", "v1", json!(1))
            .valid_since("yesterday")
            .build()
            .unwrap_err();
        assert!(matches!(err, CdbError::InvalidFormat { .. }));
    }

    #[test]
    fn test_condition_uniqueness() {
        let engine = engine();
        engine.add_condition("SND/Veto", yearly("v1")).unwrap();

        let err = engine.add_condition("SND/Veto", yearly("v1")).unwrap_err();
        assert!(matches!(err, CdbError::AlreadyExists { .. }));

        engine.add_condition("SND/Veto", yearly("v2")).unwrap();
        let all = engine.get_conditions("SND/Veto").unwrap();
        let tags: Vec<&str> = all.iter().map(|c| c.tag.as_str()).collect();
        assert_eq!(tags, vec!["v1", "v2"]);
    }

    #[test]
    fn test_add_to_missing_detector() {
        let engine = engine();
        let err = engine.add_condition("SND/Target", yearly("v1")).unwrap_err();
        assert_eq!(err.to_string(), "Detector not found: SND/Target");
    }

    #[test]
    fn test_validity_window_query() {
        let engine = engine();
        engine.add_condition("SND/Veto", yearly("v1")).unwrap();

        let hits = engine
            .get_conditions_by_name_and_validity("SND/Veto", "gain", &"2020-06-01".into(), None)
            .unwrap();
        assert_eq!(hits.len(), 1);

        let hits = engine
            .get_conditions_by_name_and_validity("SND/Veto", "gain", &"2021-01-01".into(), None)
            .unwrap();
        assert!(hits.is_empty());

        let err = engine
            .get_conditions_by_name_and_validity(
                "SND/Veto",
                "gain",
                &"2020-06-01".into(),
                Some(&"2020-05-01".into()),
            )
            .unwrap_err();
        assert!(matches!(err, CdbError::InvalidInterval { .. }));
    }

    #[test]
    fn test_inverted_window_checked_before_lookup() {
        let engine = engine();
        let err = engine
            .get_conditions_by_name_and_validity(
                "SND/Missing",
                "gain",
                &"2020-06-01".into(),
                Some(&"2020-05-01".into()),
            )
            .unwrap_err();
        assert!(matches!(err, CdbError::InvalidInterval { .. }));
    }

    #[test]
    fn test_shared_collection_date_returns_first() {
        let engine = engine();
        engine.add_condition("SND/Veto", yearly("v1")).unwrap();
        engine.add_condition("SND/Veto", yearly("v2")).unwrap();

        let found = engine
            .get_condition_by_name_and_collection_date("SND/Veto", "gain", &"2019-12-20".into())
            .unwrap()
            .unwrap();
        assert_eq!(found.tag, "v1");
    }

    #[test]
    fn test_lookups() {
        let engine = engine();
        engine.add_condition("SND/Veto", yearly("v1")).unwrap();

        assert_eq!(engine.get_conditions_by_name("SND/Veto", "gain").unwrap().len(), 1);
        assert!(engine.get_conditions_by_name("SND/Veto", "noise").unwrap().is_empty());
        assert_eq!(engine.get_conditions_by_tag("SND/Veto", "v1").unwrap().len(), 1);

        let c = engine
            .get_condition_by_name_and_tag("SND/Veto", "gain", "v1")
            .unwrap()
            .unwrap();
        assert_eq!(c.values, json!({"ch0": 1.02}));

        let c = engine
            .get_condition_by_name_and_collection_date("SND/Veto", "gain", &"2019-12-20".into())
            .unwrap();
        assert!(c.is_some());

        // Zero matches is an empty result, a missing detector is an error
        assert!(engine
            .get_condition_by_name_and_tag("SND/Veto", "gain", "v9")
            .unwrap()
            .is_none());
        assert!(matches!(
            engine.get_conditions_by_tag("SND/Nope", "v1").unwrap_err(),
            CdbError::NotFound { .. }
        ));
    }

    #[test]
    fn test_partial_update() {
        let engine = engine();
        engine.add_condition("SND/Veto", yearly("v1")).unwrap();

        let updated = engine
            .update_condition_by_name_and_tag(
                "SND/Veto",
                "gain",
                "v1",
                &ConditionUpdate::new().valid_until("2020-06-30"),
            )
            .unwrap();
        assert_eq!(updated.valid_until, time::parse_timestamp("2020-06-30").unwrap());
        assert_eq!(updated.condition_type.as_deref(), Some("calibration"));

        let stored = engine
            .get_condition_by_name_and_tag("SND/Veto", "gain", "v1")
            .unwrap()
            .unwrap();
        assert_eq!(stored, updated);
    }

    #[test]
    fn test_update_errors() {
        let engine = engine();
        engine.add_condition("SND/Veto", yearly("v1")).unwrap();

        let err = engine
            .update_condition_by_name_and_tag(
                "SND/Veto",
                "gain",
                "v9",
                &ConditionUpdate::new().condition_type("x"),
            )
            .unwrap_err();
        assert!(matches!(err, CdbError::NotFound { .. }));

        let err = engine
            .update_condition_by_name_and_tag(
                "SND/Veto",
                "gain",
                "v1",
                &ConditionUpdate::new()
                    .valid_since("2020-06-01")
                    .valid_until("2020-05-01"),
            )
            .unwrap_err();
        assert!(matches!(err, CdbError::InvalidInterval { .. }));

        // Only one bound given but the merged window would be inverted
        let err = engine
            .update_condition_by_name_and_tag(
                "SND/Veto",
                "gain",
                "v1",
                &ConditionUpdate::new().valid_since("2022-01-01"),
            )
            .unwrap_err();
        assert!(matches!(err, CdbError::InvalidInterval { .. }));
    }
}
