use super::StoreError;
use crate::utils::is_valid_key;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// A validated `/`-separated path into the store
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StorePath {
    segments: Vec<String>,
}

impl StorePath {
    /// The root of the tree
    pub fn root() -> Self {
        Self::default()
    }

    /// Parse a path such as `users/u1/status`. Leading and trailing slashes
    /// are ignored, empty segments are not.
    pub fn parse(path: &str) -> Result<Self, StoreError> {
        let trimmed = path.trim_matches('/');
        if trimmed.is_empty() {
            return Ok(Self::root());
        }

        let mut segments = Vec::new();
        for segment in trimmed.split('/') {
            if !is_valid_key(segment) {
                return Err(StoreError::InvalidPath(path.to_string()));
            }
            segments.push(segment.to_string());
        }

        Ok(Self { segments })
    }

    /// Extend the path by one key
    pub fn child(&self, key: &str) -> Result<Self, StoreError> {
        if !is_valid_key(key) {
            return Err(StoreError::InvalidPath(format!("{}/{}", self, key)));
        }
        let mut segments = self.segments.clone();
        segments.push(key.to_string());
        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// True when `other` equals this path or lies below it
    pub fn contains(&self, other: &StorePath) -> bool {
        other.segments.starts_with(&self.segments)
    }
}

impl fmt::Display for StorePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("/"))
    }
}

/// How a batch entry treats a node already present at its path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Replace whatever is there
    Overwrite,
    /// Write only if nothing is there when the batch is applied
    CreateOnly,
}

/// A flat set of `path -> value` writes applied together.
///
/// Setting the same path twice keeps the last value. A `null` value removes
/// the node at that path.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteBatch {
    entries: BTreeMap<StorePath, (WriteMode, Value)>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, path: StorePath, value: impl Into<Value>) {
        self.entries.insert(path, (WriteMode::Overwrite, value.into()));
    }

    /// Write `value` only if no node exists at `path` when the batch lands.
    pub fn create(&mut self, path: StorePath, value: impl Into<Value>) {
        self.entries.insert(path, (WriteMode::CreateOnly, value.into()));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, path: &StorePath) -> Option<&Value> {
        self.entries.get(path).map(|(_, value)| value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&StorePath, WriteMode, &Value)> {
        self.entries
            .iter()
            .map(|(path, (mode, value))| (path, *mode, value))
    }

    /// Reject root writes and entries nested inside other entries.
    ///
    /// Paths sort with ancestors directly before their descendants, so
    /// comparing neighbours finds every overlap.
    pub fn validate(&self) -> Result<(), StoreError> {
        let mut previous: Option<&StorePath> = None;

        for path in self.entries.keys() {
            if path.is_root() {
                return Err(StoreError::InvalidPath("/".to_string()));
            }
            if let Some(prev) = previous {
                if prev.contains(path) {
                    return Err(StoreError::OverlappingPaths(prev.to_string(), path.to_string()));
                }
            }
            previous = Some(path);
        }

        Ok(())
    }
}
