//! Durable client-side storage.
//!
//! The session and the external provider token survive process restarts by
//! being written to a small key/value store on disk. Each key maps to one
//! file under the storage root, mirroring how a browser keeps independent
//! localStorage entries. `MemoryStorage` backs tests.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

/// Errors from the durable storage layer.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Underlying filesystem failure.
    #[error("storage i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// The storage root could not be determined.
    #[error("could not determine home directory for storage root")]
    NoHomeDir,
}

/// Key/value persistence for client state.
///
/// Values are opaque strings; callers serialize structured data themselves.
/// All operations are synchronous so session reads never require async
/// hydration.
pub trait Storage: Send + Sync {
    /// Returns the stored value for `key`, or `None` if absent.
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Stores `value` under `key`, replacing any previous value.
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Removes the value stored under `key`. Removing an absent key is not
    /// an error.
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// File-backed storage, one file per key under a root directory.
pub struct FileStorage {
    /// Directory holding one file per stored key.
    root: PathBuf,
}

impl FileStorage {
    /// Opens storage under the default root, `~/.devhub`.
    pub fn open_default() -> Result<Self, StorageError> {
        let root = dirs::home_dir().ok_or(StorageError::NoHomeDir)?.join(".devhub");
        Ok(Self { root })
    }

    /// Opens storage under a custom root directory.
    pub fn open(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Returns the configured storage root.
    pub fn root(&self) -> &std::path::Path {
        &self.root
    }

    // Keys are fixed namespace constants, never user input, so no path
    // sanitization is needed here.
    fn entry_path(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }
}

impl Storage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let path = self.entry_path(key);
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(fs::read_to_string(&path)?))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        fs::create_dir_all(&self.root)?;
        let path = self.entry_path(key);
        fs::write(&path, value)?;

        // Session blobs contain a bearer token, keep them private on Unix
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&path, fs::Permissions::from_mode(0o600))?;
        }

        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let path = self.entry_path(key);
        if path.exists() {
            fs::remove_file(&path)?;
        }
        Ok(())
    }
}

/// In-memory storage for tests and ephemeral contexts.
#[derive(Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    /// Creates an empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Storage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.lock().remove(key);
        Ok(())
    }
}
