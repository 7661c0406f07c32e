//! Key-value storage standing in for browser local storage
//!
//! Values are plain strings. Reads never fail; writes report errors so callers
//! can log and carry on, which is how every consumer in this workspace treats
//! storage failures.

use crate::ChatRealError;
use dashmap::DashMap;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// String key-value store
pub trait KeyValueStore: Send + Sync + std::fmt::Debug {
    /// Read a value
    fn get(&self, key: &str) -> Option<String>;

    /// Write a value
    fn set(&self, key: &str, value: &str) -> Result<(), ChatRealError>;

    /// Remove a value; removing a missing key is not an error
    fn remove(&self, key: &str) -> Result<(), ChatRealError>;

    /// Whether a key is present
    fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }
}

/// Shared handle to a store
pub type SharedStore = Arc<dyn KeyValueStore>;

/// In-memory store, lost when the process exits
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: DashMap<String, String>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty store behind a shared handle
    pub fn shared() -> SharedStore {
        Arc::new(Self::new())
    }

    /// Number of stored keys
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the store is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).map(|v| v.value().clone())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), ChatRealError> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), ChatRealError> {
        self.entries.remove(key);
        Ok(())
    }
}

/// Store persisted as a JSON object in a single file
///
/// The whole map is rewritten on every change.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: RwLock<BTreeMap<String, String>>,
}

impl FileStore {
    /// Open a store, loading existing entries if the file exists
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ChatRealError> {
        let path = path.as_ref().to_path_buf();
        let entries = match std::fs::read_to_string(&path) {
            Ok(contents) if contents.trim().is_empty() => BTreeMap::new(),
            Ok(contents) => {
                serde_json::from_str(&contents).map_err(|e| ChatRealError::InvalidMessage {
                    message: path.display().to_string(),
                    source: e.into(),
                })?
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };

        debug!("Opened store {} with {} entries", path.display(), entries.len());
        Ok(Self {
            path,
            entries: RwLock::new(entries),
        })
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, key: &str, entries: &BTreeMap<String, String>) -> Result<(), ChatRealError> {
        let json = serde_json::to_string_pretty(entries).map_err(|e| ChatRealError::Storage {
            key: key.to_string(),
            reason: e.to_string(),
        })?;
        std::fs::write(&self.path, json).map_err(|e| ChatRealError::Storage {
            key: key.to_string(),
            reason: e.to_string(),
        })
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.read().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), ChatRealError> {
        let mut entries = self.entries.write();
        let previous = entries.insert(key.to_string(), value.to_string());
        if let Err(e) = self.persist(key, &entries) {
            match previous {
                Some(previous) => entries.insert(key.to_string(), previous),
                None => entries.remove(key),
            };
            return Err(e);
        }
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), ChatRealError> {
        let mut entries = self.entries.write();
        let Some(previous) = entries.remove(key) else {
            return Ok(());
        };
        if let Err(e) = self.persist(key, &entries) {
            entries.insert(key.to_string(), previous);
            return Err(e);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        let mut path = std::env::temp_dir();
        path.push(format!(
            "chatreal-store-{}-{}-{}.json",
            name,
            std::process::id(),
            rand::random::<u32>()
        ));
        path
    }

    #[test]
    fn test_memory_store_roundtrip() {
        let store = MemoryStore::new();
        assert!(store.get("theme").is_none());

        store.set("theme", "dark").unwrap();
        assert_eq!(store.get("theme").as_deref(), Some("dark"));
        assert!(store.contains("theme"));

        store.remove("theme").unwrap();
        assert!(!store.contains("theme"));
        store.remove("theme").unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn test_file_store_persists_across_reopen() {
        let path = temp_path("reopen");
        {
            let store = FileStore::open(&path).unwrap();
            store.set("username", "User-42").unwrap();
            store.set("chat-real-theme", "light").unwrap();
            store.remove("chat-real-theme").unwrap();
        }

        let reopened = FileStore::open(&path).unwrap();
        assert_eq!(reopened.get("username").as_deref(), Some("User-42"));
        assert!(reopened.get("chat-real-theme").is_none());

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_failed_write_keeps_previous_value() {
        let dir = temp_path("gone");
        std::fs::create_dir(&dir).unwrap();
        let store = FileStore::open(dir.join("store.json")).unwrap();
        store.set("username", "User-7").unwrap();
        std::fs::remove_dir_all(&dir).unwrap();

        let error = store.set("username", "User-8").unwrap_err();
        assert_eq!(error.error_code(), "STORAGE_ERROR");
        assert_eq!(store.get("username").as_deref(), Some("User-7"));

        assert!(store.set("room_x_active", "true").is_err());
        assert!(!store.contains("room_x_active"));

        assert!(store.remove("username").is_err());
        assert_eq!(store.get("username").as_deref(), Some("User-7"));
    }

    #[test]
    fn test_file_store_rejects_corrupt_file() {
        let path = temp_path("corrupt");
        std::fs::write(&path, "not json").unwrap();

        let result = FileStore::open(&path);
        assert!(matches!(result, Err(ChatRealError::InvalidMessage { .. })));

        std::fs::remove_file(&path).unwrap();
    }
}
