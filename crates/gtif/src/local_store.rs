//! Local persistent key-value store.
//!
//! The draft cache lives here. Values are plain strings under string keys,
//! the same contract a browser's local storage offers.

use std::collections::BTreeMap;
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::{debug, warn};

use crate::error::{Error, Result};

/// A synchronous string key-value store that survives restarts.
pub trait LocalStore: Send + Sync + fmt::Debug {
    /// Read the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be written.
    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Remove `key`. Removing a missing key is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be written.
    fn remove(&self, key: &str) -> Result<()>;
}

/// A [`LocalStore`] backed by a single JSON object on disk.
///
/// Every write replaces the file through a temporary sibling and a rename,
/// so readers never observe a half-written map.
#[derive(Debug)]
pub struct FileLocalStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileLocalStore {
    /// Create a store at `path`. The file is created on first write.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// Get the path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_map(&self) -> Result<BTreeMap<String, String>> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => return Err(e.into()),
        };
        match serde_json::from_str(&raw) {
            Ok(map) => Ok(map),
            Err(e) => {
                // A damaged file is treated as an empty store; the next write replaces it.
                warn!(path = %self.path.display(), error = %e, "Local store is corrupt, starting empty");
                Ok(BTreeMap::new())
            }
        }
    }

    fn write_map(&self, map: &BTreeMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        let tmp = self.path.with_extension("json.tmp");
        {
            let mut file = std::fs::File::create(&tmp)?;
            file.write_all(serde_json::to_string(map)?.as_bytes())?;
            file.sync_all()?;
        }
        std::fs::rename(&tmp, &self.path)?;
        debug!(path = %self.path.display(), entries = map.len(), "Local store written");
        Ok(())
    }

    fn locked(&self) -> std::sync::MutexGuard<'_, ()> {
        self.lock
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl LocalStore for FileLocalStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let _guard = self.locked();
        Ok(self.read_map()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let _guard = self.locked();
        let mut map = self.read_map()?;
        map.insert(key.to_string(), value.to_string());
        self.write_map(&map)
    }

    fn remove(&self, key: &str) -> Result<()> {
        let _guard = self.locked();
        let mut map = self.read_map()?;
        if map.remove(key).is_some() {
            self.write_map(&map)?;
        }
        Ok(())
    }
}

/// An in-process [`LocalStore`], used by tests and embedders.
#[derive(Debug, Default)]
pub struct MemoryLocalStore {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryLocalStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, String>> {
        self.entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Number of stored keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries().len()
    }

    /// Check if the store holds no keys.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }
}

impl LocalStore for MemoryLocalStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.entries().remove(key);
        Ok(())
    }
}
