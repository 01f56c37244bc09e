//! String-valued key-value stores that survive the view that wrote them.
//!
//! Every successful `set` emits a [`StorageEvent`] to all watchers of the
//! store, including watchers belonging to the writer. This is the only
//! cross-context signal the ledger relies on.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use thiserror::Error;

use crate::notify::{Listeners, Subscription};

/// Change notification for a single key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StorageEvent {
    pub key: String,
    pub new_value: String,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store i/o failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("store serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Durable client-local key-value storage.
pub trait DurableStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Write `value` under `key`, then notify every watcher.
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Observe all successful writes to this store.
    fn watch(&self, listener: Box<dyn Fn(&StorageEvent) + Send + Sync>) -> Subscription;
}

/// In-process store. Clones share the same data and watchers, so several
/// ledgers built over clones behave like several views of one profile.
#[derive(Clone, Default)]
pub struct MemoryStore {
    data: Arc<RwLock<BTreeMap<String, String>>>,
    watchers: Listeners<StorageEvent>,
    faults: Arc<Faults>,
}

#[derive(Default)]
struct Faults {
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent reads fail with [`StoreError::Unavailable`].
    pub fn set_fail_reads(&self, fail: bool) {
        self.faults.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Make subsequent writes fail with [`StoreError::Unavailable`].
    pub fn set_fail_writes(&self, fail: bool) {
        self.faults.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Write without emitting an event, as a foreign tool editing the profile would.
    pub fn set_silently(&self, key: &str, value: &str) {
        self.data
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value.to_string());
    }
}

impl DurableStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        if self.faults.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("reads disabled".into()));
        }
        Ok(self
            .data
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        if self.faults.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("writes disabled".into()));
        }
        self.set_silently(key, value);
        // Watchers are snapshotted after the write, so anyone registered
        // before this point sees the event.
        self.watchers.dispatch(&StorageEvent {
            key: key.to_string(),
            new_value: value.to_string(),
        });
        Ok(())
    }

    fn watch(&self, listener: Box<dyn Fn(&StorageEvent) + Send + Sync>) -> Subscription {
        self.watchers.subscribe(move |event| listener(event))
    }
}

/// JSON map persisted to `<dir>/store.json`.
///
/// The file is rewritten in full on every `set` (write to a temp file, then
/// rename). The whole map is cached in memory and reloaded on `get`, so
/// edits made by another process are picked up on the next read.
#[derive(Clone)]
pub struct FileStore {
    path: PathBuf,
    cache: Arc<RwLock<BTreeMap<String, String>>>,
    watchers: Listeners<StorageEvent>,
}

impl FileStore {
    pub const FILE_NAME: &'static str = "store.json";

    /// Open (or create) the store under `dir`.
    ///
    /// A file that doesn't parse is moved to `store.json.corrupt` and the store
    /// starts empty. Only I/O failures are errors.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;
        let path = dir.join(Self::FILE_NAME);
        let initial = match Self::read_map(&path) {
            Ok(map) => map,
            Err(StoreError::Serialization(e)) => {
                let aside = path.with_extension("json.corrupt");
                tracing::warn!(
                    error = %e,
                    path = %path.display(),
                    moved_to = %aside.display(),
                    "store file unparseable, starting empty"
                );
                std::fs::rename(&path, &aside)?;
                BTreeMap::new()
            }
            Err(e) => return Err(e),
        };
        tracing::debug!(path = %path.display(), keys = initial.len(), "opened file store");
        Ok(Self {
            path,
            cache: Arc::new(RwLock::new(initial)),
            watchers: Listeners::new(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_map(path: &Path) -> Result<BTreeMap<String, String>, StoreError> {
        match std::fs::read_to_string(path) {
            Ok(data) if data.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(data) => Ok(serde_json::from_str(&data)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn write_map(&self, map: &BTreeMap<String, String>) -> Result<(), StoreError> {
        let data = serde_json::to_string_pretty(map)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, data)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl DurableStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let fresh = Self::read_map(&self.path)?;
        let value = fresh.get(key).cloned();
        *self.cache.write().unwrap_or_else(PoisonError::into_inner) = fresh;
        Ok(value)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        {
            let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
            // Start from the file so keys written by other handles survive.
            let mut next = Self::read_map(&self.path).unwrap_or_else(|e| {
                tracing::warn!(error = %e, path = %self.path.display(), "store file unreadable, writing from cache");
                cache.clone()
            });
            next.insert(key.to_string(), value.to_string());
            self.write_map(&next)?;
            *cache = next;
        }
        self.watchers.dispatch(&StorageEvent {
            key: key.to_string(),
            new_value: value.to_string(),
        });
        Ok(())
    }

    fn watch(&self, listener: Box<dyn Fn(&StorageEvent) + Send + Sync>) -> Subscription {
        self.watchers.subscribe(move |event| listener(event))
    }
}
