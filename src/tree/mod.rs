//! Detector Tree Resolver
//!
//! Maps slash-separated paths to nodes of persisted detector trees and
//! mutates those trees.
//!
//! Each tree root is stored as one [`DetectorWrapper`] document. Every
//! mutation loads the wrapper, changes it in memory and writes it back only
//! if nobody else replaced it in between; otherwise the mutation is replayed
//! on the fresh copy.
//!
//! ```text
//!   load(rev=n) ──► resolve path ──► mutate ──► replace(if rev==n)
//!        ▲                                          │
//!        └──────────── stale revision ◄─────────────┘
//! ```

pub mod path;

pub use path::{resolve_path, resolve_path_mut, DetectorPath};

use std::sync::Arc;

use crate::error::{CdbError, CdbResult};
use crate::model::{Detector, DetectorWrapper};
use crate::store::{self, Collection, DocumentStore, StoreError, Versioned};
use crate::validation::{require_non_empty, sanitize_path};

/// Attempts before a read-modify-write gives up with `Conflict`
const MAX_ATTEMPTS: usize = 32;

/// Detector tree operations over a document store
#[derive(Clone)]
pub struct DetectorTree {
    store: Arc<dyn DocumentStore>,
}

impl DetectorTree {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    fn load(&self, root: &str) -> CdbResult<Versioned<DetectorWrapper>> {
        store::get_doc(self.store.as_ref(), Collection::Detectors, root)?
            .ok_or_else(|| CdbError::not_found("Detector", root))
    }

    /// Look up a tree by its root name
    pub fn resolve_root(&self, root: &str) -> CdbResult<DetectorWrapper> {
        Ok(self.load(root)?.document)
    }

    /// Resolve a path to a copy of its node, subtree and conditions included
    pub fn get_detector(&self, path: &str) -> CdbResult<Detector> {
        let path = DetectorPath::parse(path)?;
        let wrapper = self.resolve_root(path.root())?;
        resolve_path(&wrapper, &path).cloned()
    }

    /// Create a new tree
    pub fn create_root(&self, name: &str) -> CdbResult<Detector> {
        let name = require_non_empty("name", name)?;
        if name.contains('/') {
            return Err(CdbError::invalid_value("name", "must not contain '/'"));
        }

        let wrapper = DetectorWrapper::new(name.clone());
        match store::insert_doc(self.store.as_ref(), Collection::Detectors, &name, &wrapper) {
            Ok(()) => {}
            Err(StoreError::DuplicateKey { .. }) => {
                return Err(CdbError::already_exists("Detector", name))
            }
            Err(e) => return Err(e.into()),
        }

        tracing::info!(detector = %name, "Created detector tree");
        Ok(wrapper.detector)
    }

    /// Append a child under `parent_path`
    pub fn create_child(&self, parent_path: &str, name: &str) -> CdbResult<Detector> {
        let name = require_non_empty("name", name)?;
        if name.contains('/') {
            return Err(CdbError::invalid_value("name", "must not contain '/'"));
        }

        let parent = DetectorPath::parse(parent_path)?;
        let created = self.modify(&parent, |node| {
            if node.child(&name).is_some() {
                return Err(CdbError::already_exists(
                    "Detector",
                    parent.child(&name).to_string(),
                ));
            }
            let child = Detector::new(name.clone());
            node.subdetectors.push(child.clone());
            Ok(child)
        })?;

        tracing::info!(detector = %parent.child(&name), "Created subdetector");
        Ok(created)
    }

    /// Remove a node and everything below it.
    ///
    /// A root-only path deletes the whole tree.
    pub fn remove_path(&self, path: &str) -> CdbResult<()> {
        let path = DetectorPath::parse(path)?;

        match path.parent() {
            None => {
                if !self.store.remove(Collection::Detectors, path.root())? {
                    return Err(CdbError::not_found("Detector", path.root()));
                }
            }
            Some(parent) => {
                let leaf = path.leaf().to_string();
                self.modify(&parent, |node| {
                    node.remove_child(&leaf)
                        .map(|_| ())
                        .ok_or_else(|| CdbError::not_found("Detector", path.to_string()))
                })?;
            }
        }

        tracing::info!(detector = %path, "Removed detector");
        Ok(())
    }

    /// Full paths of the direct children of `path`, or all root names when
    /// `path` is empty
    pub fn list_children(&self, path: &str) -> CdbResult<Vec<String>> {
        if sanitize_path(path).is_empty() {
            return Ok(self.store.keys(Collection::Detectors)?);
        }

        let path = DetectorPath::parse(path)?;
        let wrapper = self.resolve_root(path.root())?;
        let node = resolve_path(&wrapper, &path)?;

        Ok(node
            .subdetectors
            .iter()
            .map(|child| path.child(&child.name).to_string())
            .collect())
    }

    /// Read-modify-write the node at `path` under a revision check.
    ///
    /// `f` may run more than once; an error from `f` aborts without writing.
    pub fn modify<T>(
        &self,
        path: &DetectorPath,
        mut f: impl FnMut(&mut Detector) -> CdbResult<T>,
    ) -> CdbResult<T> {
        for attempt in 1..=MAX_ATTEMPTS {
            let Versioned {
                revision,
                document: mut wrapper,
            } = self.load(path.root())?;

            let node = resolve_path_mut(&mut wrapper, path)?;
            let result = f(node)?;

            if store::replace_doc(
                self.store.as_ref(),
                Collection::Detectors,
                path.root(),
                revision,
                &wrapper,
            )? {
                return Ok(result);
            }

            tracing::debug!(
                detector = %path,
                attempt,
                "Detector tree changed concurrently, retrying"
            );
        }

        Err(CdbError::Conflict {
            kind: "Detector",
            id: path.root().to_string(),
        })
    }
}
