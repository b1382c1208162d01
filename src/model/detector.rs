//! Detector tree nodes

use serde::{Deserialize, Serialize};

use crate::model::Condition;

/// A node in a detector tree
///
/// Sibling names are unique. Children and conditions keep insertion order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detector {
    pub name: String,
    #[serde(default)]
    pub subdetectors: Vec<Detector>,
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

impl Detector {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            subdetectors: Vec::new(),
            conditions: Vec::new(),
        }
    }

    pub fn child(&self, name: &str) -> Option<&Detector> {
        self.subdetectors.iter().find(|d| d.name == name)
    }

    pub fn child_mut(&mut self, name: &str) -> Option<&mut Detector> {
        self.subdetectors.iter_mut().find(|d| d.name == name)
    }

    /// Remove the first child with this name
    pub fn remove_child(&mut self, name: &str) -> Option<Detector> {
        let pos = self.subdetectors.iter().position(|d| d.name == name)?;
        Some(self.subdetectors.remove(pos))
    }

    /// Number of nodes in this subtree, including self
    pub fn node_count(&self) -> usize {
        1 + self
            .subdetectors
            .iter()
            .map(Detector::node_count)
            .sum::<usize>()
    }
}

/// The unit of persistence: one document per tree root, keyed by root name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectorWrapper {
    pub name: String,
    pub detector: Detector,
}

impl DetectorWrapper {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            detector: Detector::new(name.clone()),
            name,
        }
    }
}
