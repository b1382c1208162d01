//! Slash-separated detector paths

use std::fmt;
use std::str::FromStr;

use crate::error::{CdbError, CdbResult};
use crate::model::{Detector, DetectorWrapper};
use crate::validation::split_path;

/// A parsed, non-empty detector path such as `SND/MuFilter/Veto`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DetectorPath {
    segments: Vec<String>,
}

impl DetectorPath {
    pub fn parse(path: &str) -> CdbResult<Self> {
        Ok(Self {
            segments: split_path(path)?,
        })
    }

    /// Name of the tree root, i.e. the first segment
    pub fn root(&self) -> &str {
        &self.segments[0]
    }

    /// Last segment
    pub fn leaf(&self) -> &str {
        &self.segments[self.segments.len() - 1]
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Segments below the root
    pub fn descendants(&self) -> &[String] {
        &self.segments[1..]
    }

    pub fn is_root(&self) -> bool {
        self.segments.len() == 1
    }

    pub fn parent(&self) -> Option<DetectorPath> {
        if self.is_root() {
            return None;
        }
        Some(Self {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        })
    }

    pub fn child(&self, name: &str) -> DetectorPath {
        let mut segments = self.segments.clone();
        segments.push(name.to_string());
        Self { segments }
    }

    /// The path up to and including segment `index`
    fn prefix(&self, index: usize) -> String {
        self.segments[..=index].join("/")
    }
}

impl fmt::Display for DetectorPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("/"))
    }
}

impl FromStr for DetectorPath {
    type Err = CdbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Walk from the wrapper's root down `path`.
///
/// Fails with `NotFound` naming the path up to the first missing segment.
pub fn resolve_path<'a>(
    wrapper: &'a DetectorWrapper,
    path: &DetectorPath,
) -> CdbResult<&'a Detector> {
    if wrapper.name != path.root() {
        return Err(CdbError::not_found("Detector", path.root()));
    }

    let mut current = &wrapper.detector;
    for (i, segment) in path.descendants().iter().enumerate() {
        current = current
            .child(segment)
            .ok_or_else(|| CdbError::not_found("Detector", path.prefix(i + 1)))?;
    }
    Ok(current)
}

/// Mutable variant of [`resolve_path`]
pub fn resolve_path_mut<'a>(
    wrapper: &'a mut DetectorWrapper,
    path: &DetectorPath,
) -> CdbResult<&'a mut Detector> {
    if wrapper.name != path.root() {
        return Err(CdbError::not_found("Detector", path.root()));
    }

    let mut current = &mut wrapper.detector;
    for (i, segment) in path.descendants().iter().enumerate() {
        current = match current.child_mut(segment) {
            Some(child) => child,
            None => return Err(CdbError::not_found("Detector", path.prefix(i + 1))),
        };
    }
    Ok(current)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wrapper() -> DetectorWrapper {
        let mut w = DetectorWrapper::new("A");
        let mut b = Detector::new("B");
        b.subdetectors.push(Detector::new("C"));
        w.detector.subdetectors.push(b);
        w
    }

    #[test]
    fn test_parse_and_display() {
        let path: DetectorPath = " /A/B/C/ ".parse().unwrap();
        assert_eq!(path.root(), "A");
        assert_eq!(path.leaf(), "C");
        assert_eq!(path.descendants(), ["B", "C"]);
        assert_eq!(path.to_string(), "A/B/C");
        assert_eq!(path.parent().unwrap().to_string(), "A/B");
        assert_eq!(path.child("D").to_string(), "A/B/C/D");
    }

    #[test]
    fn test_root_path() {
        let path = DetectorPath::parse("A").unwrap();
        assert!(path.is_root());
        assert!(path.parent().is_none());
        assert_eq!(path.leaf(), "A");
    }

    #[test]
    fn test_resolve() {
        let w = wrapper();
        let c = resolve_path(&w, &DetectorPath::parse("A/B/C").unwrap()).unwrap();
        assert_eq!(c.name, "C");

        let a = resolve_path(&w, &DetectorPath::parse("A").unwrap()).unwrap();
        assert_eq!(a.name, "A");
    }

    #[test]
    fn test_resolve_reports_missing_prefix() {
        let w = wrapper();
        let err = resolve_path(&w, &DetectorPath::parse("A/B/X/Y").unwrap()).unwrap_err();
        match err {
            CdbError::NotFound { kind, id } => {
                assert_eq!(kind, "Detector");
                assert_eq!(id, "A/B/X");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_resolve_wrong_root() {
        let w = wrapper();
        let err = resolve_path(&w, &DetectorPath::parse("Z/B").unwrap()).unwrap_err();
        assert_eq!(err.to_string(), "Detector not found: Z");
    }

    #[test]
    fn test_resolve_mut() {
        let mut w = wrapper();
        let path = DetectorPath::parse("A/B").unwrap();
        resolve_path_mut(&mut w, &path)
            .unwrap()
            .subdetectors
            .push(Detector::new("D"));
        assert_eq!(resolve_path(&w, &path).unwrap().subdetectors.len(), 2);
    }
}
