//! Keyed JSON store addressed by hierarchical paths.
//!
//! The store holds a single JSON tree. Records live at paths such as
//! `users/<uid>`, and individual fields at `users/<uid>/<field>`. Writes are
//! issued as a [`WriteBatch`]: a flat map of `path -> value` pairs applied as
//! one multi-path update.

mod file;
mod memory;
mod path;
mod tree;

pub use file::JsonFileStore;
pub use memory::MemoryStore;
pub use path::{StorePath, WriteBatch, WriteMode};

use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid store path '{0}'")]
    InvalidPath(String),

    #[error("Batch writes overlapping paths '{0}' and '{1}'")]
    OverlappingPaths(String, String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// A keyed store holding approval records.
#[async_trait]
pub trait KeyedStore: Send + Sync {
    /// Children of the node at `prefix`, keyed by their last path segment.
    /// Missing or non-object nodes yield an empty map.
    async fn get_all(&self, prefix: &StorePath) -> Result<BTreeMap<String, Value>, StoreError>;

    /// Whether a non-null node exists at `path`.
    async fn exists(&self, path: &StorePath) -> Result<bool, StoreError>;

    /// `exists` for each path, in order.
    async fn exists_all(&self, paths: &[StorePath]) -> Result<Vec<bool>, StoreError> {
        let mut found = Vec::with_capacity(paths.len());
        for path in paths {
            found.push(self.exists(path).await?);
        }
        Ok(found)
    }

    /// Apply the batch as one multi-path update and return the number of
    /// entries written. Create-only entries that found a node are not counted.
    async fn batch_write(&self, batch: WriteBatch) -> Result<usize, StoreError>;
}
