//! Key-value backends for the persisted history snapshot

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::debug;

use crate::error::{Error, Result};
use crate::execution::Execution;

/// Opaque JSON blob storage keyed by name
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Value>>;
    fn set(&self, key: &str, value: Value) -> Result<()>;
}

/// Persisted form of the store: completed executions only, newest first
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HistorySnapshot {
    pub history: Vec<Execution>,
}

/// In-memory backend
#[derive(Debug, Default)]
pub struct MemoryKeyValueStore {
    entries: Mutex<HashMap<String, Value>>,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryKeyValueStore {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| Error::storage("memory store lock poisoned"))?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: Value) -> Result<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| Error::storage("memory store lock poisoned"))?;
        entries.insert(key.to_string(), value);
        Ok(())
    }
}

/// File backend: one `<key>.json` per key under a state directory
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    /// Open (and create if needed) a state directory
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
            && !key.starts_with('.');
        if !valid {
            return Err(Error::storage(format!("invalid storage key: {:?}", key)));
        }
        Ok(self.dir.join(format!("{}.json", key)))
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        let path = self.path_for(key)?;
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_str(&content)?))
    }

    fn set(&self, key: &str, value: Value) -> Result<()> {
        let path = self.path_for(key)?;
        let bytes = serde_json::to_vec(&value)?;

        // Write to a sibling temp file and rename over the target
        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(&bytes)?;
        tmp.flush()?;
        tmp.persist(&path).map_err(|e| Error::Io(e.error))?;

        debug!(path = %path.display(), bytes = bytes.len(), "Persisted key");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_memory_store_get_set() {
        let store = MemoryKeyValueStore::new();
        assert!(store.get("k").unwrap().is_none());
        store.set("k", json!({"history": []})).unwrap();
        assert_eq!(store.get("k").unwrap(), Some(json!({"history": []})));
    }

    #[test]
    fn test_file_store_survives_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let store = JsonFileStore::open(temp_dir.path().join("state")).unwrap();
        store.set("mcpToolMetrics", json!({"history": [1, 2]})).unwrap();

        let reopened = JsonFileStore::open(temp_dir.path().join("state")).unwrap();
        assert_eq!(
            reopened.get("mcpToolMetrics").unwrap(),
            Some(json!({"history": [1, 2]}))
        );
        assert!(reopened.get("missing").unwrap().is_none());
    }

    #[test]
    fn test_file_store_rejects_path_like_keys() {
        let temp_dir = TempDir::new().unwrap();
        let store = JsonFileStore::open(temp_dir.path()).unwrap();
        assert!(store.set("../escape", json!(1)).is_err());
        assert!(store.get("").is_err());
    }

    #[test]
    fn test_file_store_reports_corrupt_content() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("broken.json"), "{not json").unwrap();
        let store = JsonFileStore::open(temp_dir.path()).unwrap();
        assert!(matches!(store.get("broken"), Err(Error::Serialization(_))));
    }
}
