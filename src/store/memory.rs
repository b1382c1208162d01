//! In-memory document store
//!
//! Used for tests, benchmarks and throwaway sessions. Nothing is persisted.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::{Collection, DocumentStore, Filter, StoreError, StoreResult, Versioned};

#[derive(Debug)]
struct Entry {
    seq: u64,
    revision: u64,
    document: Value,
}

/// `next_seq` orders inserts and also issues revisions, so a revision is
/// never handed out twice even when a key is removed and inserted again.
#[derive(Debug, Default)]
struct Inner {
    closed: bool,
    next_seq: u64,
    collections: HashMap<Collection, HashMap<String, Entry>>,
}

impl Inner {
    /// Entries of a collection in insertion order
    fn ordered(&self, collection: Collection) -> Vec<(&String, &Entry)> {
        let mut entries: Vec<_> = self
            .collections
            .get(&collection)
            .map(|c| c.iter().collect())
            .unwrap_or_default();
        entries.sort_by_key(|(_, e)| e.seq);
        entries
    }
}

/// Document store backed by a `RwLock`-protected map
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, Inner>> {
        let guard = self
            .inner
            .read()
            .map_err(|e| StoreError::Lock(format!("Failed to acquire read lock: {}", e)))?;
        if guard.closed {
            return Err(StoreError::Closed);
        }
        Ok(guard)
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, Inner>> {
        let guard = self
            .inner
            .write()
            .map_err(|e| StoreError::Lock(format!("Failed to acquire write lock: {}", e)))?;
        if guard.closed {
            return Err(StoreError::Closed);
        }
        Ok(guard)
    }
}

impl DocumentStore for MemoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    fn insert(&self, collection: Collection, key: &str, document: &Value) -> StoreResult<()> {
        let mut inner = self.write()?;
        inner.next_seq += 1;
        let seq = inner.next_seq;

        let entries = inner.collections.entry(collection).or_default();
        if entries.contains_key(key) {
            return Err(StoreError::DuplicateKey {
                collection: collection.name(),
                key: key.to_string(),
            });
        }
        entries.insert(
            key.to_string(),
            Entry {
                seq,
                revision: seq,
                document: document.clone(),
            },
        );
        Ok(())
    }

    fn get(&self, collection: Collection, key: &str) -> StoreResult<Option<Versioned>> {
        let inner = self.read()?;
        Ok(inner
            .collections
            .get(&collection)
            .and_then(|c| c.get(key))
            .map(|e| Versioned {
                revision: e.revision,
                document: e.document.clone(),
            }))
    }

    fn replace(
        &self,
        collection: Collection,
        key: &str,
        expected_revision: u64,
        document: &Value,
    ) -> StoreResult<bool> {
        let mut guard = self.write()?;
        let inner = &mut *guard;
        let entry = inner
            .collections
            .get_mut(&collection)
            .and_then(|c| c.get_mut(key));

        match entry {
            Some(entry) if entry.revision == expected_revision => {
                inner.next_seq += 1;
                entry.revision = inner.next_seq;
                entry.document = document.clone();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn remove(&self, collection: Collection, key: &str) -> StoreResult<bool> {
        let mut inner = self.write()?;
        Ok(inner
            .collections
            .get_mut(&collection)
            .and_then(|c| c.remove(key))
            .is_some())
    }

    fn find(&self, collection: Collection, filter: &Filter) -> StoreResult<Vec<Value>> {
        let inner = self.read()?;
        Ok(inner
            .ordered(collection)
            .into_iter()
            .filter(|(_, e)| filter.matches(&e.document))
            .map(|(_, e)| e.document.clone())
            .collect())
    }

    fn keys(&self, collection: Collection) -> StoreResult<Vec<String>> {
        let inner = self.read()?;
        Ok(inner
            .ordered(collection)
            .into_iter()
            .map(|(k, _)| k.clone())
            .collect())
    }

    fn count(&self, collection: Collection) -> StoreResult<usize> {
        let inner = self.read()?;
        Ok(inner.collections.get(&collection).map_or(0, |c| c.len()))
    }

    fn ping(&self) -> StoreResult<()> {
        self.read().map(|_| ())
    }

    fn close(&self) -> StoreResult<()> {
        let mut inner = self
            .inner
            .write()
            .map_err(|e| StoreError::Lock(format!("Failed to acquire write lock: {}", e)))?;
        inner.closed = true;
        inner.collections.clear();
        Ok(())
    }
}
