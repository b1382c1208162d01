//! SQLite document store
//!
//! All collections share one table; documents are stored as JSON text and
//! filtered with the JSON1 `json_extract` function.
//!
//! ```text
//! documents
//! ┌─────┬────────────┬─────┬──────────┬──────────────┐
//! │ seq │ collection │ key │ revision │ body (JSON)  │
//! └─────┴────────────┴─────┴──────────┴──────────────┘
//!        UNIQUE(collection, key)
//! ```

use rusqlite::{
    params, params_from_iter, Connection, ErrorCode, OpenFlags, OptionalExtension, ToSql,
};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::{Collection, DocumentStore, Filter, Predicate, StoreError, StoreResult, Versioned};

/// Document store persisted in a single SQLite database file
pub struct SqliteStore {
    conn: Mutex<Option<Connection>>,
    path: Option<PathBuf>,
}

impl SqliteStore {
    /// Open (or create) the database at `path`
    pub fn open(path: &Path) -> StoreResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        apply_pragmas(&conn)?;
        apply_schema(&conn)?;

        tracing::debug!(path = %path.display(), "Opened SQLite document store");

        Ok(Self {
            conn: Mutex::new(Some(conn)),
            path: Some(path.to_path_buf()),
        })
    }

    /// Private in-memory database, mostly for tests
    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        apply_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(Some(conn)),
            path: None,
        })
    }

    /// Path to the database file, `None` for in-memory stores
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> StoreResult<T>) -> StoreResult<T> {
        let guard = self
            .conn
            .lock()
            .map_err(|e| StoreError::Lock(format!("Failed to acquire connection lock: {}", e)))?;
        let conn = guard.as_ref().ok_or(StoreError::Closed)?;
        f(conn)
    }
}

impl DocumentStore for SqliteStore {
    fn backend(&self) -> &'static str {
        "sqlite"
    }

    fn insert(&self, collection: Collection, key: &str, document: &Value) -> StoreResult<()> {
        let body = serde_json::to_string(document)?;
        self.with_conn(|conn| {
            let tx = conn.unchecked_transaction()?;
            let revision = next_revision(&tx)?;
            let result = tx
                .prepare_cached(
                    "INSERT INTO documents (collection, key, revision, body)
                     VALUES (?1, ?2, ?3, ?4)",
                )?
                .execute(params![collection.name(), key, revision, body]);

            match result {
                Ok(_) => Ok(tx.commit()?),
                Err(rusqlite::Error::SqliteFailure(e, _))
                    if e.code == ErrorCode::ConstraintViolation =>
                {
                    Err(StoreError::DuplicateKey {
                        collection: collection.name(),
                        key: key.to_string(),
                    })
                }
                Err(e) => Err(e.into()),
            }
        })
    }

    fn get(&self, collection: Collection, key: &str) -> StoreResult<Option<Versioned>> {
        let row: Option<(i64, String)> = self.with_conn(|conn| {
            Ok(conn
                .prepare_cached(
                    "SELECT revision, body FROM documents WHERE collection = ?1 AND key = ?2",
                )?
                .query_row(params![collection.name(), key], |row| {
                    Ok((row.get(0)?, row.get(1)?))
                })
                .optional()?)
        })?;

        row.map(|(revision, body)| {
            Ok(Versioned {
                revision: revision as u64,
                document: serde_json::from_str(&body)?,
            })
        })
        .transpose()
    }

    fn replace(
        &self,
        collection: Collection,
        key: &str,
        expected_revision: u64,
        document: &Value,
    ) -> StoreResult<bool> {
        let body = serde_json::to_string(document)?;
        self.with_conn(|conn| {
            let tx = conn.unchecked_transaction()?;
            let revision = next_revision(&tx)?;
            let changed = tx
                .prepare_cached(
                    "UPDATE documents SET body = ?1, revision = ?2
                     WHERE collection = ?3 AND key = ?4 AND revision = ?5",
                )?
                .execute(params![
                    body,
                    revision,
                    collection.name(),
                    key,
                    expected_revision as i64
                ])?;
            // Dropping the transaction rolls back the counter bump
            if changed == 1 {
                tx.commit()?;
            }
            Ok(changed == 1)
        })
    }

    fn remove(&self, collection: Collection, key: &str) -> StoreResult<bool> {
        self.with_conn(|conn| {
            let deleted = conn
                .prepare_cached("DELETE FROM documents WHERE collection = ?1 AND key = ?2")?
                .execute(params![collection.name(), key])?;
            Ok(deleted > 0)
        })
    }

    fn find(&self, collection: Collection, filter: &Filter) -> StoreResult<Vec<Value>> {
        let (sql, values) = build_find_query(collection, filter);

        let bodies: Vec<String> = self.with_conn(|conn| {
            let mut stmt = conn.prepare_cached(&sql)?;
            let rows = stmt
                .query_map(params_from_iter(values.iter().map(|v| v.as_ref())), |row| {
                    row.get(0)
                })?
                .collect::<Result<Vec<String>, _>>()?;
            Ok(rows)
        })?;

        bodies
            .iter()
            .map(|body| serde_json::from_str(body).map_err(StoreError::from))
            .collect()
    }

    fn keys(&self, collection: Collection) -> StoreResult<Vec<String>> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare_cached("SELECT key FROM documents WHERE collection = ?1 ORDER BY seq")?;
            let keys = stmt
                .query_map(params![collection.name()], |row| row.get(0))?
                .collect::<Result<Vec<String>, _>>()?;
            Ok(keys)
        })
    }

    fn count(&self, collection: Collection) -> StoreResult<usize> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM documents WHERE collection = ?1",
                params![collection.name()],
                |row| row.get(0),
            )?;
            Ok(count as usize)
        })
    }

    fn ping(&self) -> StoreResult<()> {
        self.with_conn(|conn| {
            conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
            Ok(())
        })
    }

    fn close(&self) -> StoreResult<()> {
        let mut guard = self
            .conn
            .lock()
            .map_err(|e| StoreError::Lock(format!("Failed to acquire connection lock: {}", e)))?;

        if let Some(conn) = guard.take() {
            conn.close().map_err(|(_, e)| StoreError::Sqlite(e))?;
            tracing::debug!("Closed SQLite document store");
        }
        Ok(())
    }
}

/// Build `SELECT body ...` with one bound parameter pair per filter clause
fn build_find_query(collection: Collection, filter: &Filter) -> (String, Vec<Box<dyn ToSql>>) {
    let mut sql = String::from("SELECT body FROM documents WHERE collection = ?");
    let mut values: Vec<Box<dyn ToSql>> = vec![Box::new(collection.name())];

    for (field, predicate) in filter.clauses() {
        let (op, operand) = match predicate {
            Predicate::Eq(v) => ("=", v),
            Predicate::Gte(v) => (">=", v),
            Predicate::Lte(v) => ("<=", v),
        };

        match (op, sql_value(operand)) {
            ("=", None) => {
                sql.push_str(" AND json_extract(body, ?) IS NULL");
                values.push(Box::new(format!("$.{}", field)));
            }
            // Ordering against null never matches
            (_, None) => sql.push_str(" AND 0"),
            (op, Some(value)) => {
                sql.push_str(&format!(" AND json_extract(body, ?) {} ?", op));
                values.push(Box::new(format!("$.{}", field)));
                values.push(value);
            }
        }
    }

    sql.push_str(" ORDER BY seq");
    (sql, values)
}

/// Map a JSON scalar to the SQL value `json_extract` would produce for it
fn sql_value(value: &Value) -> Option<Box<dyn ToSql>> {
    match value {
        Value::Null => None,
        Value::Bool(b) => Some(Box::new(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => Some(Box::new(i)),
            None => Some(Box::new(n.as_f64().unwrap_or(f64::NAN))),
        },
        Value::String(s) => Some(Box::new(s.clone())),
        other => Some(Box::new(other.to_string())),
    }
}

fn apply_pragmas(conn: &Connection) -> StoreResult<()> {
    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         PRAGMA synchronous = NORMAL;
         PRAGMA busy_timeout = 5000;",
    )?;
    let mode: String = conn.query_row("PRAGMA journal_mode", [], |row| row.get(0))?;
    if !mode.eq_ignore_ascii_case("wal") {
        tracing::warn!(mode = %mode, "Requested WAL journal mode but SQLite refused");
    }
    Ok(())
}

/// The single-row `revisions` table is seeded from existing documents so a
/// database written before it existed keeps counting upward.
fn apply_schema(conn: &Connection) -> StoreResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS documents (
            seq INTEGER PRIMARY KEY AUTOINCREMENT,
            collection TEXT NOT NULL,
            key TEXT NOT NULL,
            revision INTEGER NOT NULL,
            body TEXT NOT NULL,
            UNIQUE(collection, key)
        );
        CREATE TABLE IF NOT EXISTS revisions (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            last INTEGER NOT NULL
        );
        INSERT OR IGNORE INTO revisions (id, last)
            SELECT 1, COALESCE(MAX(revision), 0) FROM documents;",
    )?;
    Ok(())
}

/// Draw the next revision from the store-wide counter
fn next_revision(conn: &Connection) -> StoreResult<i64> {
    conn.prepare_cached("UPDATE revisions SET last = last + 1 WHERE id = 1")?
        .execute([])?;
    Ok(conn
        .prepare_cached("SELECT last FROM revisions WHERE id = 1")?
        .query_row([], |row| row.get(0))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::conformance;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn test_insert_get_remove() {
        conformance::insert_get_remove(&SqliteStore::open_in_memory().unwrap());
    }

    #[test]
    fn test_duplicate_insert() {
        conformance::duplicate_insert(&SqliteStore::open_in_memory().unwrap());
    }

    #[test]
    fn test_revision_checked_replace() {
        conformance::revision_checked_replace(&SqliteStore::open_in_memory().unwrap());
    }

    #[test]
    fn test_revisions_not_reused_after_remove() {
        let store = SqliteStore::open_in_memory().unwrap();
        conformance::revisions_not_reused_after_remove(&store);
    }

    #[test]
    fn test_filtered_find() {
        conformance::filtered_find(&SqliteStore::open_in_memory().unwrap());
    }

    #[test]
    fn test_closed_store() {
        conformance::closed_store(&SqliteStore::open_in_memory().unwrap());
    }

    #[test]
    fn test_revision_counter_survives_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("conddb.sqlite");

        let before = {
            let store = SqliteStore::open(&path).unwrap();
            store.insert(Collection::Runs, "R1", &json!({})).unwrap();
            let rev = store.get(Collection::Runs, "R1").unwrap().unwrap().revision;
            assert!(store.remove(Collection::Runs, "R1").unwrap());
            store.close().unwrap();
            rev
        };

        let store = SqliteStore::open(&path).unwrap();
        store.insert(Collection::Runs, "R1", &json!({})).unwrap();
        let after = store.get(Collection::Runs, "R1").unwrap().unwrap().revision;
        assert!(after > before);
    }

    #[test]
    fn test_persists_across_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("conddb.sqlite");

        {
            let store = SqliteStore::open(&path).unwrap();
            store
                .insert(Collection::Fills, "F1", &json!({"fill_id": "F1"}))
                .unwrap();
            store.close().unwrap();
        }

        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(store.path(), Some(path.as_path()));
        let doc = store.get(Collection::Fills, "F1").unwrap().unwrap();
        assert_eq!(doc.document["fill_id"], "F1");
    }

    #[test]
    fn test_null_and_bool_filters() {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .insert(Collection::Files, "a", &json!({"ok": true, "dq": null}))
            .unwrap();
        store
            .insert(Collection::Files, "b", &json!({"ok": false, "dq": "bad"}))
            .unwrap();

        let found = store
            .find(Collection::Files, &Filter::new().eq("ok", true))
            .unwrap();
        assert_eq!(found.len(), 1);

        let found = store
            .find(Collection::Files, &Filter::new().eq("dq", Value::Null))
            .unwrap();
        assert_eq!(found, vec![json!({"ok": true, "dq": null})]);
    }
}
