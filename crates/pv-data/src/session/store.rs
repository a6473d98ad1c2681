//! Key-value stores backing the session

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use indexmap::IndexMap;
use parking_lot::RwLock;
use thiserror::Error;
use tracing::{debug, warn};

use crate::quota::entry_size;

/// Errors raised by a [`KeyValueStore`]
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("storage quota exceeded writing '{key}': {needed} bytes needed, {available} available")]
    QuotaExceeded {
        key: String,
        needed: usize,
        available: usize,
    },

    #[error("storage unavailable: {0}")]
    Unavailable(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    /// Whether this is the "store is full" class of failure
    pub fn is_quota_exceeded(&self) -> bool {
        matches!(self, StoreError::QuotaExceeded { .. })
    }
}

/// String key-value store with a hard capacity, modelled on browser local storage
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Write a value. Fails without modifying the store when the write
    /// would exceed the capacity.
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    fn remove(&self, key: &str) -> Result<(), StoreError>;

    /// Every key with the size of its value in bytes
    fn entries(&self) -> Result<Vec<(String, usize)>, StoreError>;

    /// Bytes held by the store, keys included
    fn total_size(&self) -> Result<usize, StoreError> {
        Ok(self
            .entries()?
            .iter()
            .map(|(key, value_len)| key.len() + value_len)
            .sum())
    }
}

/// In-memory store with a byte capacity
pub struct MemoryStore {
    entries: RwLock<IndexMap<String, String>>,
    capacity: usize,
    available: AtomicBool,
}

impl MemoryStore {
    /// Create a store that holds at most `capacity` bytes
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: RwLock::new(IndexMap::new()),
            capacity,
            available: AtomicBool::new(true),
        }
    }

    /// Create a store without a practical size limit
    pub fn unbounded() -> Self {
        Self::with_capacity(usize::MAX)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Simulate the store becoming unreachable (e.g. storage disabled)
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    fn ensure_available(&self) -> Result<(), StoreError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Unavailable("storage is disabled".to_string()))
        }
    }

    fn snapshot(&self) -> IndexMap<String, String> {
        self.entries.read().clone()
    }

    fn replace_all(&self, entries: IndexMap<String, String>) {
        *self.entries.write() = entries;
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.ensure_available()?;
        Ok(self.entries.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.ensure_available()?;
        let mut entries = self.entries.write();

        let used: usize = entries.iter().map(|(k, v)| entry_size(k, v)).sum();
        let replaced = entries.get(key).map(|old| entry_size(key, old)).unwrap_or(0);
        let needed = entry_size(key, value);
        let available = self.capacity.saturating_sub(used - replaced);

        if needed > available {
            return Err(StoreError::QuotaExceeded {
                key: key.to_string(),
                needed,
                available,
            });
        }

        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.ensure_available()?;
        self.entries.write().shift_remove(key);
        Ok(())
    }

    fn entries(&self) -> Result<Vec<(String, usize)>, StoreError> {
        self.ensure_available()?;
        Ok(self
            .entries
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.len()))
            .collect())
    }
}

/// Store with the same capacity rules as [`MemoryStore`], mirrored to a JSON file
pub struct FileStore {
    path: PathBuf,
    inner: MemoryStore,
}

impl FileStore {
    /// Open (or create on first write) a store file.
    ///
    /// An unreadable or malformed file starts an empty store.
    pub fn open(path: impl Into<PathBuf>, capacity: usize) -> Self {
        let path = path.into();
        let inner = MemoryStore::with_capacity(capacity);

        match std::fs::read_to_string(&path) {
            Ok(text) => match serde_json::from_str::<IndexMap<String, String>>(&text) {
                Ok(entries) => {
                    debug!("Opened session store {} with {} keys", path.display(), entries.len());
                    inner.replace_all(entries);
                }
                Err(e) => warn!("Ignoring malformed session store {}: {}", path.display(), e),
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to read session store {}: {}", path.display(), e),
        }

        Self { path, inner }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self) -> Result<(), StoreError> {
        let json = serde_json::to_string(&self.inner.snapshot())?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::Unavailable(e.to_string()))?;
        }
        std::fs::write(&self.path, json).map_err(|e| StoreError::Unavailable(e.to_string()))
    }

    /// Run a mutation and persist it, restoring the previous contents if the file write fails
    fn commit(&self, mutate: impl FnOnce(&MemoryStore) -> Result<(), StoreError>) -> Result<(), StoreError> {
        let before = self.inner.snapshot();
        mutate(&self.inner)?;
        if let Err(e) = self.flush() {
            self.inner.replace_all(before);
            return Err(e);
        }
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.commit(|inner| inner.set(key, value))
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.commit(|inner| inner.remove(key))
    }

    fn entries(&self) -> Result<Vec<(String, usize)>, StoreError> {
        self.inner.entries()
    }
}
