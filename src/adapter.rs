//! Conditions database facade
//!
//! [`ConditionsDb`] is the public operation surface: detector trees,
//! conditions and the fill/run/file and emulsion/brick registries, all over
//! one shared [`DocumentStore`] handle.
//!
//! ```rust,no_run
//! use conddb::{ConditionsDb, NewCondition, RunAttributes, SqliteStore};
//! use std::sync::Arc;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = SqliteStore::open(std::path::Path::new("conddb.sqlite"))?;
//!     let db = ConditionsDb::new(Arc::new(store));
//!
//!     db.add_detector("SND", None)?;
//!     db.add_detector("Veto", Some("SND"))?;
//!     db.add_condition(
//!         "SND/Veto",
//!         NewCondition::new("gain", "2022", serde_json::json!({"ch0": 1.02}))
//!             .valid_since("2022-01-01")
//!             .valid_until("2022-12-31 23:59:59"),
//!     )?;
//!
//!     db.add_fill("F1", "2022-07-05 10:00", "2022-07-05 22:00", None)?;
//!     db.add_run(
//!         "R1",
//!         "F1",
//!         "2022-07-05 10:30",
//!         "2022-07-05 12:00",
//!         Some(RunAttributes::default().nb_events(13)),
//!     )?;
//!
//!     db.shutdown()?;
//!     Ok(())
//! }
//! ```

use std::sync::Arc;

use crate::conditions::{ConditionEngine, ConditionUpdate, NewCondition};
use crate::error::CdbResult;
use crate::model::{
    Brick, BrickAttributes, Condition, Detector, Emulsion, EmulsionAttributes, File,
    FileAttributes, Fill, FillAttributes, Run, RunAttributes,
};
use crate::runs::Registry;
use crate::store::{Collection, DocumentStore};
use crate::time::TimeArg;
use crate::tree::DetectorTree;

/// Entry point for all conditions database operations
#[derive(Clone)]
pub struct ConditionsDb {
    store: Arc<dyn DocumentStore>,
    tree: DetectorTree,
    conditions: ConditionEngine,
    registry: Registry,
}

impl ConditionsDb {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        let tree = DetectorTree::new(Arc::clone(&store));
        Self {
            conditions: ConditionEngine::new(tree.clone()),
            registry: Registry::new(Arc::clone(&store)),
            tree,
            store,
        }
    }

    /// Name of the storage backend in use
    pub fn backend(&self) -> &'static str {
        self.store.backend()
    }

    /// Check that the store still answers
    pub fn ping(&self) -> CdbResult<()> {
        Ok(self.store.ping()?)
    }

    /// Document counts per collection
    pub fn stats(&self) -> CdbResult<Vec<(Collection, usize)>> {
        Collection::ALL
            .iter()
            .map(|&c| Ok((c, self.store.count(c)?)))
            .collect()
    }

    /// Release the store handle. Every later operation fails.
    pub fn shutdown(&self) -> CdbResult<()> {
        self.store.close()?;
        tracing::info!(backend = self.store.backend(), "Conditions database closed");
        Ok(())
    }

    // ──────────────────── detectors ────────────────────

    /// Add a detector: a new tree when `parent_path` is `None`, otherwise a
    /// child of the node at `parent_path`
    pub fn add_detector(&self, name: &str, parent_path: Option<&str>) -> CdbResult<Detector> {
        match parent_path {
            None => self.tree.create_root(name),
            Some(parent) => self.tree.create_child(parent, name),
        }
    }

    pub fn remove_detector(&self, path: &str) -> CdbResult<()> {
        self.tree.remove_path(path)
    }

    /// Child paths of `path`, or all root names when `path` is empty
    pub fn list_detectors(&self, path: &str) -> CdbResult<Vec<String>> {
        self.tree.list_children(path)
    }

    pub fn get_detector(&self, path: &str) -> CdbResult<Detector> {
        self.tree.get_detector(path)
    }

    // ──────────────────── conditions ────────────────────

    pub fn add_condition(
        &self,
        detector_path: &str,
        condition: NewCondition,
    ) -> CdbResult<Condition> {
        self.conditions.add_condition(detector_path, condition)
    }

    pub fn get_conditions(&self, detector_path: &str) -> CdbResult<Vec<Condition>> {
        self.conditions.get_conditions(detector_path)
    }

    pub fn get_conditions_by_name(
        &self,
        detector_path: &str,
        name: &str,
    ) -> CdbResult<Vec<Condition>> {
        self.conditions.get_conditions_by_name(detector_path, name)
    }

    pub fn get_conditions_by_tag(
        &self,
        detector_path: &str,
        tag: &str,
    ) -> CdbResult<Vec<Condition>> {
        self.conditions.get_conditions_by_tag(detector_path, tag)
    }

    pub fn get_conditions_by_name_and_validity(
        &self,
        detector_path: &str,
        name: &str,
        start: impl Into<TimeArg>,
        end: Option<TimeArg>,
    ) -> CdbResult<Vec<Condition>> {
        self.conditions.get_conditions_by_name_and_validity(
            detector_path,
            name,
            &start.into(),
            end.as_ref(),
        )
    }

    pub fn get_condition_by_name_and_tag(
        &self,
        detector_path: &str,
        name: &str,
        tag: &str,
    ) -> CdbResult<Option<Condition>> {
        self.conditions
            .get_condition_by_name_and_tag(detector_path, name, tag)
    }

    pub fn get_condition_by_name_and_collection_date(
        &self,
        detector_path: &str,
        name: &str,
        collected_at: impl Into<TimeArg>,
    ) -> CdbResult<Option<Condition>> {
        self.conditions.get_condition_by_name_and_collection_date(
            detector_path,
            name,
            &collected_at.into(),
        )
    }

    pub fn update_condition_by_name_and_tag(
        &self,
        detector_path: &str,
        name: &str,
        tag: &str,
        update: ConditionUpdate,
    ) -> CdbResult<Condition> {
        self.conditions
            .update_condition_by_name_and_tag(detector_path, name, tag, &update)
    }

    // ──────────────────── fills ────────────────────

    pub fn add_fill(
        &self,
        fill_id: &str,
        start: impl Into<TimeArg>,
        end: impl Into<TimeArg>,
        attributes: Option<FillAttributes>,
    ) -> CdbResult<Fill> {
        self.registry
            .add(fill_id, None, &start.into(), &end.into(), attributes)
    }

    pub fn get_fill(&self, fill_id: &str) -> CdbResult<Fill> {
        self.registry.get(fill_id)
    }

    pub fn remove_fill(&self, fill_id: &str) -> CdbResult<()> {
        self.registry.remove::<Fill>(fill_id)
    }

    pub fn list_fills(
        &self,
        start: Option<TimeArg>,
        end: Option<TimeArg>,
    ) -> CdbResult<Vec<String>> {
        self.registry.list::<Fill>(None, start.as_ref(), end.as_ref())
    }

    pub fn add_attributes_to_fill(
        &self,
        fill_id: &str,
        attributes: FillAttributes,
    ) -> CdbResult<Fill> {
        self.registry.add_attributes(fill_id, attributes)
    }

    // ──────────────────── runs ────────────────────

    pub fn add_run(
        &self,
        run_id: &str,
        fill_id: &str,
        start: impl Into<TimeArg>,
        end: impl Into<TimeArg>,
        attributes: Option<RunAttributes>,
    ) -> CdbResult<Run> {
        self.registry
            .add(run_id, Some(fill_id), &start.into(), &end.into(), attributes)
    }

    pub fn get_run(&self, run_id: &str) -> CdbResult<Run> {
        self.registry.get(run_id)
    }

    pub fn remove_run(&self, run_id: &str) -> CdbResult<()> {
        self.registry.remove::<Run>(run_id)
    }

    pub fn list_runs(
        &self,
        fill_id: Option<&str>,
        start: Option<TimeArg>,
        end: Option<TimeArg>,
    ) -> CdbResult<Vec<String>> {
        self.registry.list::<Run>(fill_id, start.as_ref(), end.as_ref())
    }

    pub fn add_attributes_to_run(&self, run_id: &str, attributes: RunAttributes) -> CdbResult<Run> {
        self.registry.add_attributes(run_id, attributes)
    }

    // ──────────────────── files ────────────────────

    pub fn add_file(
        &self,
        run_id: &str,
        file_id: &str,
        start: impl Into<TimeArg>,
        end: impl Into<TimeArg>,
        attributes: Option<FileAttributes>,
    ) -> CdbResult<File> {
        self.registry
            .add(file_id, Some(run_id), &start.into(), &end.into(), attributes)
    }

    pub fn get_file(&self, file_id: &str) -> CdbResult<File> {
        self.registry.get(file_id)
    }

    pub fn remove_file(&self, file_id: &str) -> CdbResult<()> {
        self.registry.remove::<File>(file_id)
    }

    pub fn list_files(
        &self,
        run_id: Option<&str>,
        start: Option<TimeArg>,
        end: Option<TimeArg>,
    ) -> CdbResult<Vec<String>> {
        self.registry.list::<File>(run_id, start.as_ref(), end.as_ref())
    }

    pub fn add_attributes_to_file(
        &self,
        file_id: &str,
        attributes: FileAttributes,
    ) -> CdbResult<File> {
        self.registry.add_attributes(file_id, attributes)
    }

    // ──────────────────── emulsions ────────────────────

    pub fn add_emulsion(
        &self,
        emulsion_id: &str,
        start: impl Into<TimeArg>,
        end: impl Into<TimeArg>,
        attributes: Option<EmulsionAttributes>,
    ) -> CdbResult<Emulsion> {
        self.registry
            .add(emulsion_id, None, &start.into(), &end.into(), attributes)
    }

    pub fn get_emulsion(&self, emulsion_id: &str) -> CdbResult<Emulsion> {
        self.registry.get(emulsion_id)
    }

    pub fn remove_emulsion(&self, emulsion_id: &str) -> CdbResult<()> {
        self.registry.remove::<Emulsion>(emulsion_id)
    }

    pub fn list_emulsions(
        &self,
        start: Option<TimeArg>,
        end: Option<TimeArg>,
    ) -> CdbResult<Vec<String>> {
        self.registry
            .list::<Emulsion>(None, start.as_ref(), end.as_ref())
    }

    pub fn add_attributes_to_emulsion(
        &self,
        emulsion_id: &str,
        attributes: EmulsionAttributes,
    ) -> CdbResult<Emulsion> {
        self.registry.add_attributes(emulsion_id, attributes)
    }

    // ──────────────────── bricks ────────────────────

    pub fn add_brick(
        &self,
        brick_id: &str,
        emulsion_id: &str,
        start: impl Into<TimeArg>,
        end: impl Into<TimeArg>,
        attributes: Option<BrickAttributes>,
    ) -> CdbResult<Brick> {
        self.registry
            .add(brick_id, Some(emulsion_id), &start.into(), &end.into(), attributes)
    }

    pub fn get_brick(&self, brick_id: &str) -> CdbResult<Brick> {
        self.registry.get(brick_id)
    }

    pub fn remove_brick(&self, brick_id: &str) -> CdbResult<()> {
        self.registry.remove::<Brick>(brick_id)
    }

    pub fn list_bricks(
        &self,
        emulsion_id: Option<&str>,
        start: Option<TimeArg>,
        end: Option<TimeArg>,
    ) -> CdbResult<Vec<String>> {
        self.registry
            .list::<Brick>(emulsion_id, start.as_ref(), end.as_ref())
    }

    pub fn add_attributes_to_brick(
        &self,
        brick_id: &str,
        attributes: BrickAttributes,
    ) -> CdbResult<Brick> {
        self.registry.add_attributes(brick_id, attributes)
    }

    /// The generic registry, for callers working over any entity kind
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CdbError;
    use crate::model::{Attribute, TimedEntity};
    use crate::store::{MemoryStore, SqliteStore, StoreError};
    use crate::time;
    use chrono::{DateTime, Duration, NaiveDate, Utc};
    use serde_json::json;
    use tempfile::tempdir;

    fn memory_db() -> ConditionsDb {
        ConditionsDb::new(Arc::new(MemoryStore::new()))
    }

    /// Fill -> run -> attribute -> teardown, ending in NotFound
    fn end_to_end(db: &ConditionsDb) {
        let now = Utc::now();
        let start = now - Duration::hours(1);
        let end = now + Duration::hours(1);

        db.add_fill("F1", start, end, None).unwrap();
        db.add_run("R1", "F1", start, end, None).unwrap();
        db.add_attributes_to_run("R1", RunAttributes::default().nb_events(13))
            .unwrap();

        let run = db.get_run("R1").unwrap();
        assert_eq!(run.attributes, vec![Attribute::new("nb_events", json!(13))]);
        assert_eq!(
            serde_json::to_value(&run.attributes[0]).unwrap(),
            json!({"name": "nb_events", "type": "int", "values": 13})
        );

        db.remove_run("R1").unwrap();
        db.remove_fill("F1").unwrap();

        let err = db.get_fill("F1").unwrap_err();
        assert!(matches!(err, CdbError::NotFound { .. }));
    }

    #[test]
    fn test_end_to_end_memory() {
        end_to_end(&memory_db());
    }

    /// Out-of-range times are refused before any document is written
    fn time_range_edges(db: &ConditionsDb) {
        db.add_detector("SND", None).unwrap();
        db.add_detector("Veto", Some("SND")).unwrap();

        let far = NaiveDate::from_ymd_opt(10000, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let err = db
            .add_condition("SND/Veto", NewCondition::new("gain", "far", json!(1)).valid_until(far))
            .unwrap_err();
        assert!(matches!(err, CdbError::InvalidValue { .. }));

        // The tree stays readable and writable
        assert!(db.get_detector("SND").unwrap().subdetectors[0].conditions.is_empty());
        assert_eq!(db.list_detectors("SND").unwrap(), vec!["SND/Veto"]);
        db.add_detector("Target", Some("SND")).unwrap();

        let past_end = DateTime::<Utc>::from_timestamp(253_402_300_800, 0).unwrap();
        let err = db.add_fill("F1", "2022-07-05", past_end, None).unwrap_err();
        assert!(matches!(err, CdbError::InvalidValue { .. }));
        assert!(matches!(db.get_fill("F1").unwrap_err(), CdbError::NotFound { .. }));
        assert!(db.list_fills(None, None).unwrap().is_empty());

        // The largest storable time round-trips through the store
        db.add_condition("SND/Veto", NewCondition::new("gain", "open", json!(1)))
            .unwrap();
        let stored = db
            .get_condition_by_name_and_tag("SND/Veto", "gain", "open")
            .unwrap()
            .unwrap();
        assert_eq!(stored.valid_until, time::max_timestamp());

        db.add_fill("F2", "2022-07-05", time::max_timestamp(), None)
            .unwrap();
        assert_eq!(db.get_fill("F2").unwrap().end_time, time::max_timestamp());
        assert_eq!(db.list_fills(None, None).unwrap(), vec!["F2"]);
    }

    #[test]
    fn test_time_range_edges_memory() {
        time_range_edges(&memory_db());
    }

    #[test]
    fn test_time_range_edges_sqlite() {
        let dir = tempdir().unwrap();
        let store = SqliteStore::open(&dir.path().join("edges.sqlite")).unwrap();
        time_range_edges(&ConditionsDb::new(Arc::new(store)));
    }

    #[test]
    fn test_end_to_end_sqlite() {
        let dir = tempdir().unwrap();
        let store = SqliteStore::open(&dir.path().join("conddb.sqlite")).unwrap();
        end_to_end(&ConditionsDb::new(Arc::new(store)));
    }

    #[test]
    fn test_detector_and_condition_flow() {
        let db = memory_db();
        db.add_detector("SND", None).unwrap();
        db.add_detector("MuFilter", Some("SND")).unwrap();
        db.add_detector("Veto", Some("SND/MuFilter")).unwrap();

        assert_eq!(db.list_detectors("").unwrap(), vec!["SND"]);
        assert_eq!(db.list_detectors("SND").unwrap(), vec!["SND/MuFilter"]);

        db.add_condition(
            "SND/MuFilter/Veto",
            NewCondition::new("gain", "2022", json!([1.0, 1.1]))
                .valid_since("2022-01-01")
                .valid_until("2022-12-31"),
        )
        .unwrap();

        let hits = db
            .get_conditions_by_name_and_validity("SND/MuFilter/Veto", "gain", "2022-06-01", None)
            .unwrap();
        assert_eq!(hits.len(), 1);

        let updated = db
            .update_condition_by_name_and_tag(
                "SND/MuFilter/Veto",
                "gain",
                "2022",
                ConditionUpdate::new().condition_type("calibration"),
            )
            .unwrap();
        assert_eq!(updated.condition_type.as_deref(), Some("calibration"));

        // Conditions travel with the subtree
        let mufilter = db.get_detector("SND/MuFilter").unwrap();
        assert_eq!(mufilter.subdetectors[0].conditions.len(), 1);

        db.remove_detector("SND/MuFilter").unwrap();
        assert!(matches!(
            db.get_conditions("SND/MuFilter/Veto").unwrap_err(),
            CdbError::NotFound { .. }
        ));
    }

    #[test]
    fn test_file_and_brick_wrappers() {
        let db = memory_db();
        db.add_fill("F1", "2022-07-05", "2022-07-06", Some(FillAttributes::default().energy(6800)))
            .unwrap();
        db.add_run("R1", "F1", "2022-07-05 01:00", "2022-07-05 02:00", None)
            .unwrap();
        let file = db
            .add_file(
                "R1",
                "sndsw_raw_000001.root",
                "2022-07-05 01:00",
                "2022-07-05 01:10",
                Some(FileAttributes::default().size(1024).dq("good")),
            )
            .unwrap();
        assert_eq!(file.parent_id(), Some("R1"));
        assert_eq!(db.list_files(Some("R1"), None, None).unwrap().len(), 1);

        db.add_emulsion("E1", "2022-04", "2022-07", None).unwrap();
        db.add_brick("B11", "E1", "2022-04-07", "2022-05-01", None)
            .unwrap();
        db.add_attributes_to_brick("B11", BrickAttributes::default().scanning_lab("Napoli"))
            .unwrap();
        assert_eq!(db.get_brick("B11").unwrap().attributes.len(), 1);
        assert_eq!(db.list_emulsions(None, None).unwrap(), vec!["E1"]);

        db.remove_file("sndsw_raw_000001.root").unwrap();
        db.remove_brick("B11").unwrap();
        db.remove_emulsion("E1").unwrap();
        assert!(db.list_bricks(None, None, None).unwrap().is_empty());
    }

    #[test]
    fn test_list_fills_windows() {
        let db = memory_db();
        db.add_fill("F1", "2022-07-01", "2022-07-02", None).unwrap();
        db.add_fill("F2", "2022-07-03", "2022-07-04", None).unwrap();

        assert_eq!(
            db.list_fills(Some("2022-07-02".into()), None).unwrap(),
            vec!["F2"]
        );
        assert_eq!(
            db.list_fills(None, Some("2022-07-02".into())).unwrap(),
            vec!["F1"]
        );
        assert_eq!(db.list_runs(Some("F1"), None, None).unwrap().len(), 0);
    }

    #[test]
    fn test_stats_and_shutdown() {
        let db = memory_db();
        db.add_detector("SND", None).unwrap();
        db.add_fill("F1", "2022", "2023", None).unwrap();

        let stats = db.stats().unwrap();
        assert!(stats.contains(&(Collection::Detectors, 1)));
        assert!(stats.contains(&(Collection::Fills, 1)));
        assert_eq!(db.backend(), "memory");

        db.ping().unwrap();
        db.shutdown().unwrap();
        assert!(matches!(
            db.get_fill("F1").unwrap_err(),
            CdbError::Store(StoreError::Closed)
        ));
    }
}
