//! Shared key-value store.
//!
//! The only resource shared between cooperating instances. Writes become
//! visible to other instances with some delay and there is no
//! compare-and-swap; every algorithm on top of it tolerates lost, delayed,
//! and interleaved writes.

use async_trait::async_trait;
use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[async_trait]
pub trait SharedStore: Send + Sync {
    async fn get(&self, key: &str) -> StoreResult<Option<Value>>;
    async fn set(&self, key: &str, value: Value) -> StoreResult<()>;
    async fn delete(&self, key: &str) -> StoreResult<()>;
}

/// Read a typed record. A value that no longer matches `T` is treated as
/// absent so that a corrupt record gets overwritten instead of wedging
/// every reader.
pub async fn get_json<T: DeserializeOwned>(
    store: &dyn SharedStore,
    key: &str,
) -> StoreResult<Option<T>> {
    let Some(value) = store.get(key).await? else {
        return Ok(None);
    };
    match serde_json::from_value(value) {
        Ok(record) => Ok(Some(record)),
        Err(e) => {
            tracing::warn!("[Store] Ignoring malformed value at '{}': {}", key, e);
            Ok(None)
        },
    }
}

pub async fn set_json<T: Serialize + Sync>(
    store: &dyn SharedStore,
    key: &str,
    value: &T,
) -> StoreResult<()> {
    let value = serde_json::to_value(value).map_err(|e| StoreError::Serialization(e.to_string()))?;
    store.set(key, value).await
}

/// In-process store. Shared by `Arc` between instances living in one
/// process (tests, embedded hosts).
#[derive(Default)]
pub struct MemoryStore {
    entries: DashMap<String, Value>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl SharedStore for MemoryStore {
    async fn get(&self, key: &str) -> StoreResult<Option<Value>> {
        Ok(self.entries.get(key).map(|v| v.value().clone()))
    }

    async fn set(&self, key: &str, value: Value) -> StoreResult<()> {
        self.entries.insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        self.entries.remove(key);
        Ok(())
    }
}

/// Store backed by one JSON document on disk, readable by every instance
/// of the deployment.
///
/// Each write re-reads the document, applies the change and replaces the
/// file atomically (temp file + rename). Concurrent writers from other
/// processes may lose updates; callers are built for that.
pub struct FileStore {
    path: PathBuf,
    write_lock: tokio::sync::Mutex<()>,
    temp_suffix: String,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: tokio::sync::Mutex::new(()),
            temp_suffix: format!("{}.tmp", uuid::Uuid::new_v4().simple()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_document(&self) -> StoreResult<Map<String, Value>> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Map::new()),
            Err(e) => return Err(StoreError::Io(e)),
        };
        if content.trim().is_empty() {
            return Ok(Map::new());
        }
        match serde_json::from_str::<Value>(&content) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) | Err(_) => {
                // Torn or foreign file; the next write replaces it.
                tracing::warn!("[Store] {} is not a JSON object, treating as empty", self.path.display());
                Ok(Map::new())
            },
        }
    }

    async fn write_document(&self, document: Map<String, Value>) -> StoreResult<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let temp_path = self.path.with_extension(&self.temp_suffix);
        let json_str = serde_json::to_string_pretty(&Value::Object(document))
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        tokio::fs::write(&temp_path, json_str).await?;
        tokio::fs::rename(&temp_path, &self.path).await?;
        Ok(())
    }

    async fn modify<F>(&self, change: F) -> StoreResult<()>
    where
        F: FnOnce(&mut Map<String, Value>) + Send,
    {
        let _guard = self.write_lock.lock().await;
        let mut document = self.read_document().await?;
        change(&mut document);
        self.write_document(document).await
    }
}

#[async_trait]
impl SharedStore for FileStore {
    async fn get(&self, key: &str) -> StoreResult<Option<Value>> {
        let mut document = self.read_document().await?;
        Ok(document.remove(key))
    }

    async fn set(&self, key: &str, value: Value) -> StoreResult<()> {
        let key = key.to_string();
        self.modify(move |doc| {
            doc.insert(key, value);
        })
        .await
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        self.modify(|doc| {
            doc.remove(key);
        })
        .await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use switchyard_types::LeaderRecord;

    #[tokio::test]
    async fn test_memory_store_roundtrip_and_delete() {
        let store = MemoryStore::new();
        set_json(&store, "leader", &LeaderRecord::claim("a", 1)).await.unwrap();

        let read: Option<LeaderRecord> = get_json(&store, "leader").await.unwrap();
        assert_eq!(read.unwrap().instance_id, "a");

        store.delete("leader").await.unwrap();
        assert!(store.get("leader").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_malformed_value_reads_as_absent() {
        let store = MemoryStore::new();
        store.set("leader", serde_json::json!({"bogus": true})).await.unwrap();
        let read: Option<LeaderRecord> = get_json(&store, "leader").await.unwrap();
        assert!(read.is_none());
    }

    #[tokio::test]
    async fn test_file_store_visible_to_second_handle() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shared").join("state.json");
        let writer = FileStore::new(&path);
        let reader = FileStore::new(&path);

        writer.set("a", serde_json::json!(1)).await.unwrap();
        writer.set("b", serde_json::json!("two")).await.unwrap();
        assert_eq!(reader.get("a").await.unwrap(), Some(serde_json::json!(1)));

        reader.delete("a").await.unwrap();
        assert!(writer.get("a").await.unwrap().is_none());
        assert_eq!(writer.get("b").await.unwrap(), Some(serde_json::json!("two")));
    }

    #[tokio::test]
    async fn test_file_store_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("absent.json"));
        assert!(store.get("anything").await.unwrap().is_none());
    }
}
