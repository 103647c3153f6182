//! Durable string-keyed storage boundary
//!
//! The place store persists through this interface; the engine only
//! assumes get/set/remove semantics. `FileStore` keeps the whole map in
//! one JSON file and replaces it atomically on every write, so a reader
//! never observes a partially written value.

use crate::infra::error::{EngineError, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::path::{Path, PathBuf};
use tracing::warn;

/// String-keyed, string-valued durable store
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Absent keys are `Ok(None)`, not an error
    async fn get(&self, key: &str) -> Result<Option<String>>;

    async fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Removing an absent key is a no-op
    async fn remove(&self, key: &str) -> Result<()>;
}

/// In-memory store for tests and ephemeral hosts
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<FxHashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.lock().get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.entries.lock().remove(key);
        Ok(())
    }
}

/// File-backed store: one JSON object per file, atomic replace on write
pub struct FileStore {
    path: PathBuf,
    /// Serializes read-modify-write cycles so concurrent writes for
    /// different keys never interleave corruptly
    write_lock: tokio::sync::Mutex<()>,
}

impl FileStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self { path: path.as_ref().to_path_buf(), write_lock: tokio::sync::Mutex::new(()) }
    }

    async fn read_map(&self) -> Result<FxHashMap<String, String>> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(map) => Ok(map),
                Err(e) => {
                    // A corrupt file reads as empty rather than failing
                    // the engine; writes will replace it wholesale.
                    warn!(path = %self.path.display(), error = %e, "store_file_corrupt");
                    Ok(FxHashMap::default())
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(FxHashMap::default()),
            Err(e) => Err(EngineError::storage(e.to_string())),
        }
    }

    async fn write_map(&self, map: &FxHashMap<String, String>) -> Result<()> {
        let content = serde_json::to_string(map)?;
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, content.as_bytes())
            .await
            .map_err(|e| EngineError::storage(e.to_string()))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| EngineError::storage(e.to_string()))
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.read_map().await?.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut map = self.read_map().await?;
        map.insert(key.to_string(), value.to_string());
        self.write_map(&map).await
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut map = self.read_map().await?;
        if map.remove(key).is_some() {
            self.write_map(&map).await?;
        }
        Ok(())
    }
}
