//! Persistent key/value storage backing the session.
//!
//! Plays the part browser storage plays for a web front end: string keys,
//! string values, shared by every tab of the same profile.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use thiserror::Error;

/// Errors writing the session store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Filesystem operation failed.
    #[error("session store I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The store contents could not be serialized.
    #[error("session store encoding error: {0}")]
    Encode(#[from] serde_json::Error),
}

/// A single change in a write batch: `Some` sets the key, `None` removes it.
pub type Change<'a> = (&'a str, Option<String>);

/// Key/value storage for session fields.
///
/// Reads never fail: anything unreadable is reported as absent. Writes apply
/// a whole batch at once and [`Self::read_all`] returns one consistent view,
/// so a reader never observes half a login.
pub trait SessionStore: Send + Sync {
    /// Every stored entry, read in one step.
    fn read_all(&self) -> BTreeMap<String, String>;

    /// Read a single key.
    fn get(&self, key: &str) -> Option<String> {
        self.read_all().remove(key)
    }

    /// Apply every change in `batch` as one write.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing storage cannot be written.
    fn write(&self, batch: &[Change<'_>]) -> Result<(), StoreError>;
}

fn apply(map: &mut BTreeMap<String, String>, batch: &[Change<'_>]) {
    for (key, value) in batch {
        match value {
            Some(value) => {
                map.insert((*key).to_string(), value.clone());
            }
            None => {
                map.remove(*key);
            }
        }
    }
}

// =============================================================================
// MemoryStore
// =============================================================================

/// In-process store. Shared between tabs by sharing the `Arc` that holds it.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemoryStore {
    fn read_all(&self) -> BTreeMap<String, String> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn get(&self, key: &str) -> Option<String> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    fn write(&self, batch: &[Change<'_>]) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        apply(&mut entries, batch);
        Ok(())
    }
}

// =============================================================================
// FileStore
// =============================================================================

/// JSON file store. Every read goes to disk so separate processes sharing the
/// file see each other's logins and logouts.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    // Serializes read-modify-write cycles within this process.
    write_lock: Mutex<()>,
}

impl FileStore {
    /// Create a store backed by `path`. The file is created on first write.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// The file this store persists to.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> BTreeMap<String, String> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return BTreeMap::new(),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Failed to read session file");
                return BTreeMap::new();
            }
        };

        serde_json::from_str(&raw).unwrap_or_else(|e| {
            tracing::warn!(path = %self.path.display(), error = %e, "Ignoring corrupt session file");
            BTreeMap::new()
        })
    }
}

impl SessionStore for FileStore {
    fn read_all(&self) -> BTreeMap<String, String> {
        self.load()
    }

    fn write(&self, batch: &[Change<'_>]) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);

        let mut entries = self.load();
        apply(&mut entries, batch);

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        // Write then rename so a concurrent reader sees the old or the new
        // file, never a truncated one.
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_vec_pretty(&entries)?)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}
