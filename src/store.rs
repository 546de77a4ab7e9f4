//! Durable local state storage.
//!
//! The session manager persists through the [`StateStore`] port rather
//! than touching the filesystem directly, so tests can substitute an
//! in-memory store. The production [`DiskStore`] keeps one JSON file
//! per key in the user's config directory.

use std::fs;
use std::path::PathBuf;
use tracing::info;

/// Key for the serialized chat history.
pub(crate) const HISTORY_KEY: &str = "chat_history";

/// Key for the dark mode preference.
pub(crate) const DARK_MODE_KEY: &str = "dark_mode";

/// Port for durable key-value state.
pub(crate) trait StateStore {
    /// Read the bytes stored under `key`, if any.
    fn load(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Overwrite the bytes stored under `key`.
    fn save(&mut self, key: &str, bytes: &[u8]) -> Result<(), StoreError>;
}

/// File-backed store rooted in the platform config directory.
pub(crate) struct DiskStore {
    dir: PathBuf,
}

impl DiskStore {
    /// Open the default store location.
    pub(crate) fn open_default() -> Result<Self, StoreError> {
        let dir = dirs::config_dir()
            .ok_or(StoreError::NoConfigDir)?
            .join("Parley");
        Self::open(dir)
    }

    /// Open a store rooted at `dir`, creating it if needed.
    pub(crate) fn open(dir: PathBuf) -> Result<Self, StoreError> {
        if !dir.exists() {
            fs::create_dir_all(&dir).map_err(|e| StoreError::CreateDirectory {
                path: dir.clone(),
                source: e,
            })?;
            info!("Created state directory: {:?}", dir);
        }
        Ok(Self { dir })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl StateStore for DiskStore {
    fn load(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }
        fs::read(&path)
            .map(Some)
            .map_err(|e| StoreError::ReadFile { path, source: e })
    }

    fn save(&mut self, key: &str, bytes: &[u8]) -> Result<(), StoreError> {
        let path = self.path_for(key);
        fs::write(&path, bytes).map_err(|e| StoreError::WriteFile { path, source: e })
    }
}

/// Storage errors with contextual information.
#[derive(Debug, thiserror::Error)]
pub(crate) enum StoreError {
    #[error("Could not find config directory")]
    NoConfigDir,

    #[error("Failed to create directory {path}: {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read file {path}: {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write to file {path}: {source}")]
    WriteFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// In-memory store for tests.
#[cfg(test)]
#[derive(Default)]
pub(crate) struct MemoryStore {
    entries: std::collections::HashMap<String, Vec<u8>>,
}

#[cfg(test)]
impl MemoryStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Seed an entry, e.g. with deliberately corrupt bytes.
    pub(crate) fn insert(&mut self, key: &str, bytes: Vec<u8>) {
        self.entries.insert(key.to_string(), bytes);
    }
}

#[cfg(test)]
impl StateStore for MemoryStore {
    fn load(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.entries.get(key).cloned())
    }

    fn save(&mut self, key: &str, bytes: &[u8]) -> Result<(), StoreError> {
        self.entries.insert(key.to_string(), bytes.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disk_store_round_trip() {
        let tmp = tempfile::tempdir().expect("Failed to create temp dir");
        let mut store = DiskStore::open(tmp.path().join("state")).expect("Failed to open store");

        assert!(store.load(HISTORY_KEY).expect("load failed").is_none());

        store
            .save(HISTORY_KEY, br#"[["a"]]"#)
            .expect("save failed");
        let bytes = store
            .load(HISTORY_KEY)
            .expect("load failed")
            .expect("entry missing");
        assert_eq!(bytes, br#"[["a"]]"#);
    }

    #[test]
    fn test_disk_store_keys_are_independent() {
        let tmp = tempfile::tempdir().expect("Failed to create temp dir");
        let mut store = DiskStore::open(tmp.path().to_path_buf()).expect("Failed to open store");

        store.save(HISTORY_KEY, b"[]").expect("save failed");
        store.save(DARK_MODE_KEY, b"true").expect("save failed");

        assert_eq!(store.load(HISTORY_KEY).unwrap().unwrap(), b"[]");
        assert_eq!(store.load(DARK_MODE_KEY).unwrap().unwrap(), b"true");
    }

    #[test]
    fn test_memory_store_overwrites_in_place() {
        let mut store = MemoryStore::new();
        store.save("k", b"one").unwrap();
        store.save("k", b"two").unwrap();
        assert_eq!(store.load("k").unwrap().unwrap(), b"two");
    }
}
