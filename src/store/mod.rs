//! Document Store
//!
//! The persistence collaborator behind the conditions database: named
//! collections of JSON documents addressed by a string key.
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │            dyn DocumentStore                 │
//! │  insert / get / replace(rev) / remove / find │
//! └───────────────┬──────────────────────────────┘
//!                 │
//!        ┌────────┴────────┐
//!        ▼                 ▼
//!  ┌───────────┐     ┌─────────────┐
//!  │MemoryStore│     │ SqliteStore │
//!  │ (RwLock)  │     │ (WAL, JSON1)│
//!  └───────────┘     └─────────────┘
//! ```
//!
//! Every document carries a revision number that changes on each
//! replacement. `replace` only succeeds when the caller's revision is still
//! current, which lets higher layers do copy-then-replace without losing
//! concurrent updates. Revisions come from a per-store counter that only
//! grows, so a removed and reinserted key never repeats an old revision.

pub mod error;
pub mod memory;
pub mod sqlite;

pub use error::{StoreError, StoreResult};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::cmp::Ordering;
use std::fmt;

/// Named document collections
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Detectors,
    Fills,
    Runs,
    Files,
    Emulsions,
    Bricks,
}

impl Collection {
    pub const ALL: [Collection; 6] = [
        Collection::Detectors,
        Collection::Fills,
        Collection::Runs,
        Collection::Files,
        Collection::Emulsions,
        Collection::Bricks,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Collection::Detectors => "detectors",
            Collection::Fills => "fills",
            Collection::Runs => "runs",
            Collection::Files => "files",
            Collection::Emulsions => "emulsions",
            Collection::Bricks => "bricks",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A stored document together with its revision
#[derive(Debug, Clone, PartialEq)]
pub struct Versioned<T = Value> {
    pub revision: u64,
    pub document: T,
}

/// Comparison applied to one top-level field
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Eq(Value),
    Gte(Value),
    Lte(Value),
}

/// Conjunction of field predicates
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    clauses: Vec<(String, Predicate)>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.clauses.push((field.into(), Predicate::Eq(value.into())));
        self
    }

    pub fn gte(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.clauses.push((field.into(), Predicate::Gte(value.into())));
        self
    }

    pub fn lte(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.clauses.push((field.into(), Predicate::Lte(value.into())));
        self
    }

    pub fn clauses(&self) -> &[(String, Predicate)] {
        &self.clauses
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// Evaluate against a document. Missing fields read as null.
    pub fn matches(&self, document: &Value) -> bool {
        self.clauses.iter().all(|(field, predicate)| {
            let actual = document.get(field).unwrap_or(&Value::Null);
            match predicate {
                Predicate::Eq(expected) => actual == expected,
                Predicate::Gte(bound) => {
                    matches!(compare(actual, bound), Some(Ordering::Greater | Ordering::Equal))
                }
                Predicate::Lte(bound) => {
                    matches!(compare(actual, bound), Some(Ordering::Less | Ordering::Equal))
                }
            }
        })
    }
}

/// Order two scalars of the same kind; strings compare bytewise
fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::String(a), Value::String(b)) => Some(a.as_str().cmp(b.as_str())),
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

/// Storage backend for the conditions database
///
/// Implementations must be safe to share between threads; the adapter holds
/// one instance behind an `Arc` for its whole lifetime.
pub trait DocumentStore: Send + Sync {
    /// Short backend name used in logs
    fn backend(&self) -> &'static str;

    /// Insert a new document; fails with `DuplicateKey` if the key exists
    fn insert(&self, collection: Collection, key: &str, document: &Value) -> StoreResult<()>;

    fn get(&self, collection: Collection, key: &str) -> StoreResult<Option<Versioned>>;

    /// Replace a document if its revision is still `expected_revision`.
    ///
    /// Returns `false` when the document changed or disappeared meanwhile.
    fn replace(
        &self,
        collection: Collection,
        key: &str,
        expected_revision: u64,
        document: &Value,
    ) -> StoreResult<bool>;

    /// Remove a document, returning whether it existed
    fn remove(&self, collection: Collection, key: &str) -> StoreResult<bool>;

    /// All documents matching `filter`, in insertion order
    fn find(&self, collection: Collection, filter: &Filter) -> StoreResult<Vec<Value>>;

    /// All keys in insertion order
    fn keys(&self, collection: Collection) -> StoreResult<Vec<String>>;

    fn count(&self, collection: Collection) -> StoreResult<usize>;

    /// Cheap liveness check
    fn ping(&self) -> StoreResult<()>;

    /// Release the underlying resources. Later calls fail with `Closed`.
    fn close(&self) -> StoreResult<()>;
}

/// Serialize and insert a typed document
pub fn insert_doc<T: Serialize>(
    store: &dyn DocumentStore,
    collection: Collection,
    key: &str,
    document: &T,
) -> StoreResult<()> {
    let value = serde_json::to_value(document)?;
    store.insert(collection, key, &value)
}

/// Fetch and deserialize a typed document
pub fn get_doc<T: DeserializeOwned>(
    store: &dyn DocumentStore,
    collection: Collection,
    key: &str,
) -> StoreResult<Option<Versioned<T>>> {
    store
        .get(collection, key)?
        .map(|v| {
            Ok(Versioned {
                revision: v.revision,
                document: serde_json::from_value(v.document)?,
            })
        })
        .transpose()
}

/// Serialize and conditionally replace a typed document
pub fn replace_doc<T: Serialize>(
    store: &dyn DocumentStore,
    collection: Collection,
    key: &str,
    expected_revision: u64,
    document: &T,
) -> StoreResult<bool> {
    let value = serde_json::to_value(document)?;
    store.replace(collection, key, expected_revision, &value)
}

/// Find and deserialize typed documents
pub fn find_docs<T: DeserializeOwned>(
    store: &dyn DocumentStore,
    collection: Collection,
    filter: &Filter,
) -> StoreResult<Vec<T>> {
    store
        .find(collection, filter)?
        .into_iter()
        .map(|v| serde_json::from_value(v).map_err(StoreError::from))
        .collect()
}

/// Shared behavioural checks run against every backend
#[cfg(test)]
pub(crate) mod conformance {
    use super::*;
    use serde_json::json;

    pub fn insert_get_remove(store: &dyn DocumentStore) {
        let doc = json!({"fill_id": "F1", "start_time": "2020-01-01T00:00:00"});
        store.insert(Collection::Fills, "F1", &doc).unwrap();

        let stored = store.get(Collection::Fills, "F1").unwrap().unwrap();
        assert_eq!(stored.revision, 1);
        assert_eq!(stored.document, doc);

        // Same key in another collection is independent
        assert!(store.get(Collection::Runs, "F1").unwrap().is_none());

        assert!(store.remove(Collection::Fills, "F1").unwrap());
        assert!(!store.remove(Collection::Fills, "F1").unwrap());
        assert!(store.get(Collection::Fills, "F1").unwrap().is_none());
    }

    pub fn duplicate_insert(store: &dyn DocumentStore) {
        store.insert(Collection::Runs, "R1", &json!({})).unwrap();
        let err = store.insert(Collection::Runs, "R1", &json!({})).unwrap_err();
        assert!(matches!(err, StoreError::DuplicateKey { .. }));
    }

    pub fn revision_checked_replace(store: &dyn DocumentStore) {
        store
            .insert(Collection::Detectors, "SND", &json!({"v": 1}))
            .unwrap();

        assert!(store
            .replace(Collection::Detectors, "SND", 1, &json!({"v": 2}))
            .unwrap());
        // Stale revision loses
        assert!(!store
            .replace(Collection::Detectors, "SND", 1, &json!({"v": 3}))
            .unwrap());
        // Missing document loses
        assert!(!store
            .replace(Collection::Detectors, "other", 1, &json!({}))
            .unwrap());

        let current = store.get(Collection::Detectors, "SND").unwrap().unwrap();
        assert_eq!(current.revision, 2);
        assert_eq!(current.document, json!({"v": 2}));
    }

    pub fn revisions_not_reused_after_remove(store: &dyn DocumentStore) {
        store
            .insert(Collection::Detectors, "SND", &json!({"gen": "old"}))
            .unwrap();
        let stale = store.get(Collection::Detectors, "SND").unwrap().unwrap();

        assert!(store.remove(Collection::Detectors, "SND").unwrap());
        store
            .insert(Collection::Detectors, "SND", &json!({"gen": "new"}))
            .unwrap();
        let fresh = store.get(Collection::Detectors, "SND").unwrap().unwrap();
        assert!(fresh.revision > stale.revision);

        // A writer still holding the old revision must not win
        assert!(!store
            .replace(
                Collection::Detectors,
                "SND",
                stale.revision,
                &json!({"gen": "old-modified"})
            )
            .unwrap());
        let current = store.get(Collection::Detectors, "SND").unwrap().unwrap();
        assert_eq!(current.document, json!({"gen": "new"}));

        assert!(store
            .replace(Collection::Detectors, "SND", fresh.revision, &json!({"gen": "newer"}))
            .unwrap());
    }

    pub fn filtered_find(store: &dyn DocumentStore) {
        for (id, fill, start, end) in [
            ("R1", "F1", "2020-01-01T00:00:00", "2020-01-01T06:00:00"),
            ("R2", "F1", "2020-01-01T06:00:00", "2020-01-01T12:00:00"),
            ("R3", "F2", "2020-01-02T00:00:00", "2020-01-02T06:00:00"),
        ] {
            let doc = json!({
                "run_id": id,
                "fill_id": fill,
                "start_time": start,
                "end_time": end,
                "nb": 1,
            });
            store.insert(Collection::Runs, id, &doc).unwrap();
        }

        let ids = |filter: Filter| -> Vec<String> {
            store
                .find(Collection::Runs, &filter)
                .unwrap()
                .iter()
                .map(|d| d["run_id"].as_str().unwrap().to_string())
                .collect()
        };

        assert_eq!(ids(Filter::new()), vec!["R1", "R2", "R3"]);
        assert_eq!(ids(Filter::new().eq("fill_id", "F1")), vec!["R1", "R2"]);
        assert_eq!(
            ids(Filter::new().gte("start_time", "2020-01-01T06:00:00")),
            vec!["R2", "R3"]
        );
        assert_eq!(
            ids(Filter::new()
                .eq("fill_id", "F1")
                .lte("end_time", "2020-01-01T06:00:00")),
            vec!["R1"]
        );
        assert_eq!(ids(Filter::new().eq("nb", 1)).len(), 3);
        assert!(ids(Filter::new().eq("fill_id", "F9")).is_empty());

        assert_eq!(store.keys(Collection::Runs).unwrap(), vec!["R1", "R2", "R3"]);
        assert_eq!(store.count(Collection::Runs).unwrap(), 3);
    }

    pub fn closed_store(store: &dyn DocumentStore) {
        store.ping().unwrap();
        store.close().unwrap();
        assert!(matches!(store.ping(), Err(StoreError::Closed)));
        assert!(matches!(
            store.get(Collection::Fills, "F1"),
            Err(StoreError::Closed)
        ));
    }
}
