use super::path::{StorePath, WriteBatch};
use super::{tree, KeyedStore, StoreError};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::debug;

/// KeyedStore persisting the whole tree in one JSON file.
///
/// Every batch is a read-modify-write of the file under a lock, finished
/// with a temp file + rename so readers never see a partial tree.
pub struct JsonFileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    async fn read_tree(&self) -> Result<Value, StoreError> {
        if !self.path.exists() {
            return Ok(Value::Object(Map::new()));
        }

        let content = fs::read_to_string(&self.path).await?;
        if content.trim().is_empty() {
            return Ok(Value::Object(Map::new()));
        }
        Ok(serde_json::from_str(&content)?)
    }

    async fn write_tree(&self, root: &Value) -> Result<(), StoreError> {
        // Ensure parent directory exists
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        // Write atomically using temp file + rename
        let temp_path = self.path.with_extension("json.tmp");
        let content = serde_json::to_string_pretty(root)?;
        fs::write(&temp_path, &content).await?;
        fs::rename(&temp_path, &self.path).await?;

        Ok(())
    }
}

#[async_trait]
impl KeyedStore for JsonFileStore {
    async fn get_all(&self, prefix: &StorePath) -> Result<BTreeMap<String, Value>, StoreError> {
        let root = self.read_tree().await?;
        Ok(tree::children(&root, prefix))
    }

    async fn exists(&self, path: &StorePath) -> Result<bool, StoreError> {
        let root = self.read_tree().await?;
        Ok(tree::get(&root, path).is_some())
    }

    /// One file read for the whole set
    async fn exists_all(&self, paths: &[StorePath]) -> Result<Vec<bool>, StoreError> {
        let root = self.read_tree().await?;
        Ok(paths.iter().map(|path| tree::get(&root, path).is_some()).collect())
    }

    async fn batch_write(&self, batch: WriteBatch) -> Result<usize, StoreError> {
        // Lock the entire read-modify-write cycle
        let _guard = self.lock.lock().await;

        let mut root = self.read_tree().await?;
        let applied = tree::apply(&mut root, &batch)?;
        if applied > 0 {
            self.write_tree(&root).await?;
        }

        debug!(
            path = %self.path.display(),
            entries = batch.len(),
            applied,
            "Applied batch write"
        );
        Ok(applied)
    }
}
