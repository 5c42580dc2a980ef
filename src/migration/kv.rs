use crate::engine::StorageTarget;
use crate::error::CastorError;
use crate::utils::fs::atomic_write_async;
use async_trait::async_trait;
use std::{
    collections::{BTreeMap, HashMap},
    io,
    path::PathBuf,
    sync::{Arc, Mutex, PoisonError},
};

/// Cache key holding the digest of the last applied migration set.
pub const SCHEMA_HASH_KEY: &str = "CASTOR_SCHEMA_HASH";

/// Small durable string map.
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, CastorError>;
    async fn set(&self, key: &str, value: &str) -> Result<(), CastorError>;
    async fn remove(&self, key: &str) -> Result<(), CastorError>;
}

/// Picks the store matching the storage target's durability.
pub fn kv_store_for(storage: &StorageTarget) -> Arc<dyn KvStore> {
    match storage.kv_path() {
        Some(path) => Arc::new(FileKvStore::new(path)),
        None => Arc::new(MemoryKvStore::default()),
    }
}

#[derive(Default)]
pub struct MemoryKvStore {
    entries: Mutex<HashMap<String, String>>,
}

#[async_trait]
impl KvStore for MemoryKvStore {
    async fn get(&self, key: &str) -> Result<Option<String>, CastorError> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), CastorError> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), CastorError> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.remove(key);
        Ok(())
    }
}

/// JSON object on disk, rewritten atomically (synced temp file + persist) on every change.
pub struct FileKvStore {
    path: PathBuf,
    write_guard: tokio::sync::Mutex<()>,
}

impl FileKvStore {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            write_guard: tokio::sync::Mutex::new(()),
        }
    }

    async fn load(&self) -> Result<BTreeMap<String, String>, CastorError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(err) => Err(err.into()),
        }
    }

    async fn store(&self, entries: &BTreeMap<String, String>) -> Result<(), CastorError> {
        let json = serde_json::to_vec_pretty(entries)?;
        atomic_write_async(self.path.clone(), json).await?;
        Ok(())
    }
}

#[async_trait]
impl KvStore for FileKvStore {
    async fn get(&self, key: &str) -> Result<Option<String>, CastorError> {
        Ok(self.load().await?.remove(key))
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), CastorError> {
        let _guard = self.write_guard.lock().await;
        let mut entries = self.load().await?;
        entries.insert(key.to_string(), value.to_string());
        self.store(&entries).await
    }

    async fn remove(&self, key: &str) -> Result<(), CastorError> {
        let _guard = self.write_guard.lock().await;
        let mut entries = self.load().await?;
        if entries.remove(key).is_some() {
            self.store(&entries).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn file_store_persists_across_instances() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("kv.json");

        let first = FileKvStore::new(path.clone());
        assert_eq!(first.get(SCHEMA_HASH_KEY).await.unwrap(), None);
        first.set(SCHEMA_HASH_KEY, "abc").await.unwrap();
        first.set("other", "1").await.unwrap();

        let second = FileKvStore::new(path.clone());
        assert_eq!(
            second.get(SCHEMA_HASH_KEY).await.unwrap().as_deref(),
            Some("abc")
        );

        second.remove(SCHEMA_HASH_KEY).await.unwrap();
        assert_eq!(first.get(SCHEMA_HASH_KEY).await.unwrap(), None);
        assert_eq!(first.get("other").await.unwrap().as_deref(), Some("1"));
    }

    #[tokio::test]
    async fn rewrites_leave_no_temp_files_behind() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FileKvStore::new(dir.path().join("kv.json"));

        for i in 0..5 {
            store.set(SCHEMA_HASH_KEY, &i.to_string()).await.unwrap();
        }
        store.remove(SCHEMA_HASH_KEY).await.unwrap();

        let names: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("kv.json")]);
    }

    #[tokio::test]
    async fn file_store_reports_corrupt_contents() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("kv.json");
        std::fs::write(&path, "not json").unwrap();

        let store = FileKvStore::new(path);
        assert!(matches!(
            store.get(SCHEMA_HASH_KEY).await,
            Err(CastorError::JsonError(_))
        ));
    }

    #[tokio::test]
    async fn memory_store_round_trip() {
        let store = MemoryKvStore::default();
        store.set("k", "v").await.unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v"));
        store.remove("k").await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), None);
    }
}
