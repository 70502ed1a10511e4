use super::path::{StorePath, WriteBatch};
use super::{tree, KeyedStore, StoreError};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

/// In-memory KeyedStore for local development and tests.
///
/// Clones share the same tree, so a test can keep a handle while the
/// Reconciler owns another.
#[derive(Clone)]
pub struct MemoryStore {
    tree: Arc<Mutex<Value>>,
    batch_writes: Arc<AtomicUsize>,
    unavailable: Arc<AtomicBool>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::with_data(Value::Object(Map::new()))
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing tree
    pub fn with_data(data: Value) -> Self {
        Self {
            tree: Arc::new(Mutex::new(data)),
            batch_writes: Arc::new(AtomicUsize::new(0)),
            unavailable: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Return a copy of the whole tree (primarily for tests).
    pub async fn snapshot(&self) -> Value {
        self.tree.lock().await.clone()
    }

    /// Node at `path`, if any
    pub async fn get(&self, path: &StorePath) -> Option<Value> {
        let root = self.tree.lock().await;
        tree::get(&root, path).cloned()
    }

    /// Number of batch writes applied so far
    pub fn batch_write_count(&self) -> usize {
        self.batch_writes.load(Ordering::SeqCst)
    }

    /// Make every call fail as if the backend were down
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory store marked unavailable".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl KeyedStore for MemoryStore {
    async fn get_all(&self, prefix: &StorePath) -> Result<BTreeMap<String, Value>, StoreError> {
        self.check_available()?;
        let root = self.tree.lock().await;
        Ok(tree::children(&root, prefix))
    }

    async fn exists(&self, path: &StorePath) -> Result<bool, StoreError> {
        self.check_available()?;
        let root = self.tree.lock().await;
        Ok(tree::get(&root, path).is_some())
    }

    async fn batch_write(&self, batch: WriteBatch) -> Result<usize, StoreError> {
        self.check_available()?;
        let mut root = self.tree.lock().await;
        let applied = tree::apply(&mut root, &batch)?;
        self.batch_writes.fetch_add(1, Ordering::SeqCst);
        Ok(applied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn path(s: &str) -> StorePath {
        StorePath::parse(s).unwrap()
    }

    #[tokio::test]
    async fn test_batch_write_and_read_back() {
        let store = MemoryStore::new();
        let mut batch = WriteBatch::new();
        batch.set(path("users/u1/status"), "approved");
        batch.set(path("users/u2"), json!({"status": "pending"}));

        assert_eq!(store.batch_write(batch).await.unwrap(), 2);

        assert_eq!(store.batch_write_count(), 1);
        assert!(store.exists(&path("users/u1")).await.unwrap());
        assert!(!store.exists(&path("users/u3")).await.unwrap());
        let users = store.get_all(&path("users")).await.unwrap();
        assert_eq!(users.len(), 2);
        assert_eq!(users["u2"], json!({"status": "pending"}));
    }

    #[tokio::test]
    async fn test_get_reads_through_the_lock() {
        let store = MemoryStore::with_data(json!({"users": {"u1": {"status": "pending"}}}));
        assert_eq!(store.get(&path("users/u1/status")).await, Some(json!("pending")));
        assert!(store.get(&path("users/u2")).await.is_none());
        assert_eq!(
            store.exists_all(&[path("users/u1"), path("users/u2")]).await.unwrap(),
            vec![true, false]
        );
    }

    #[tokio::test]
    async fn test_rejected_batch_is_not_counted() {
        let store = MemoryStore::new();
        let mut batch = WriteBatch::new();
        batch.set(path("users/u1"), json!({}));
        batch.set(path("users/u1/status"), "approved");

        assert!(store.batch_write(batch).await.is_err());
        assert_eq!(store.batch_write_count(), 0);
        assert_eq!(store.snapshot().await, json!({}));
    }

    #[tokio::test]
    async fn test_unavailable_store_fails_every_call() {
        let store = MemoryStore::new();
        store.set_unavailable(true);

        assert!(matches!(
            store.get_all(&path("users")).await,
            Err(StoreError::Unavailable(_))
        ));
        assert!(store.exists(&path("users/u1")).await.is_err());
        assert!(store.batch_write(WriteBatch::new()).await.is_err());
    }
}
