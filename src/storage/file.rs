//! Durable file-backed storage backend.

use crate::errors::StorageError;
use crate::storage::KeyValueStore;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use tracing::warn;

/// Durable storage persisted as a JSON map on disk.
///
/// The platform-appropriate stand-in for the browser's durable key-value
/// storage: entries survive process restarts. Every write flushes the full
/// map; the data set is four small strings, so this stays cheap.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: RwLock<HashMap<String, String>>,
}

impl FileStore {
    /// Open a file store, loading any existing entries.
    ///
    /// A missing file is an empty store; an unreadable or corrupt file is
    /// treated as empty with a warning, so a damaged cache can never block
    /// startup.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = match Self::load(&path) {
            Ok(entries) => entries,
            Err(err) => {
                warn!(path = %path.display(), "failed to load session store, starting empty: {err}");
                HashMap::new()
            }
        };

        Self {
            path,
            entries: RwLock::new(entries),
        }
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(path: &Path) -> Result<HashMap<String, String>, StorageError> {
        if !path.exists() {
            return Ok(HashMap::new());
        }
        let raw = std::fs::read_to_string(path)
            .map_err(|e| StorageError::unavailable("file", e.to_string()))?;
        serde_json::from_str(&raw).map_err(|e| StorageError::unavailable("file", e.to_string()))
    }

    fn flush(&self, entries: &HashMap<String, String>) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| StorageError::write_failed("file", e.to_string()))?;
        }
        let raw = serde_json::to_string(entries)
            .map_err(|e| StorageError::write_failed("file", e.to_string()))?;
        std::fs::write(&self.path, raw).map_err(|e| StorageError::write_failed("file", e.to_string()))
    }
}

impl KeyValueStore for FileStore {
    fn name(&self) -> &'static str {
        "file"
    }

    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.read().unwrap().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.write().unwrap();
        entries.insert(key.to_string(), value.to_string());
        self.flush(&entries)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.write().unwrap();
        if entries.remove(key).is_some() {
            self.flush(&entries)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("secret-safe-auth-test-{}-{name}.json", std::process::id()))
    }

    #[test]
    fn persists_across_reopen() {
        let path = temp_path("reopen");
        let _ = std::fs::remove_file(&path);

        let store = FileStore::open(&path);
        store.set("k", "v").unwrap();
        drop(store);

        let reopened = FileStore::open(&path);
        assert_eq!(reopened.get("k").unwrap(), Some("v".to_string()));

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn corrupt_file_starts_empty() {
        let path = temp_path("corrupt");
        std::fs::write(&path, "{not json").unwrap();

        let store = FileStore::open(&path);
        assert_eq!(store.get("k").unwrap(), None);

        let _ = std::fs::remove_file(&path);
    }
}
