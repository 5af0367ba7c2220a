//! Durable key-value storage for small SDK state.
//!
//! The host app can supply its own [`SecureStore`] (backed by whatever
//! secure storage the platform offers); [`FileStore`] is the built-in
//! file-backed implementation and [`MemoryStore`] keeps everything
//! in-process for tests.

use fs2::FileExt;
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{ConvoKitError, ErrorCode, Result};

/// Persistent string storage keyed by name.
pub trait SecureStore: Send + Sync {
    /// Load the value stored under `key`, or `None` if absent.
    fn load(&self, key: &str) -> Result<Option<String>>;

    /// Store `value` under `key`, replacing any previous value.
    fn save(&self, key: &str, value: &str) -> Result<()>;

    /// Remove the value stored under `key`. Missing keys are not an error.
    fn remove(&self, key: &str) -> Result<()>;
}

/// Load and deserialize a JSON value from a store.
pub fn load_value<T: DeserializeOwned>(store: &dyn SecureStore, key: &str) -> Result<Option<T>> {
    match store.load(key)? {
        None => Ok(None),
        Some(raw) => {
            let value = serde_json::from_str(&raw).map_err(|e| {
                ConvoKitError::with_source(
                    ErrorCode::StorageInvalidData,
                    format!("Stored value under '{}' is not valid JSON", key),
                    e,
                )
            })?;
            Ok(Some(value))
        }
    }
}

/// Serialize a value to JSON and store it.
pub fn save_value<T: Serialize>(store: &dyn SecureStore, key: &str, value: &T) -> Result<()> {
    let raw = serde_json::to_string(value).map_err(|e| {
        ConvoKitError::with_source(
            ErrorCode::StorageWriteError,
            format!("Failed to serialize value for '{}'", key),
            e,
        )
    })?;
    store.save(key, &raw)
}

/// File-backed store: one file per key under a root directory.
///
/// Writes go to a temporary file first and are moved into place, so a
/// crash mid-write never leaves a torn value. A lock file serializes
/// writers across processes.
pub struct FileStore {
    root: PathBuf,
    lock_file_path: PathBuf,
}

impl FileStore {
    /// Create a store rooted at `root`, creating the directory if needed.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|e| {
            ConvoKitError::with_source(
                ErrorCode::StorageWriteError,
                format!("Failed to create storage directory: {}", root.display()),
                e,
            )
        })?;
        let lock_file_path = root.join("convokit-store.lock");
        Ok(Self {
            root,
            lock_file_path,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let safe: String = key
            .chars()
            .map(|c| if c == '/' || c == '\\' { '_' } else { c })
            .collect();
        self.root.join(format!("{}.json", safe))
    }

    fn acquire_lock(&self) -> Result<File> {
        let lock_file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&self.lock_file_path)
            .map_err(|e| {
                ConvoKitError::with_source(ErrorCode::StorageWriteError, "Failed to open lock file", e)
            })?;

        lock_file.lock_exclusive().map_err(|e| {
            ConvoKitError::with_source(
                ErrorCode::StorageWriteError,
                "Failed to acquire storage lock",
                e,
            )
        })?;

        Ok(lock_file)
    }
}

impl SecureStore for FileStore {
    fn load(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key);
        match fs::read_to_string(&path) {
            Ok(raw) => Ok(Some(raw)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(ConvoKitError::with_source(
                ErrorCode::StorageReadError,
                format!("Failed to read stored value: {}", path.display()),
                e,
            )),
        }
    }

    fn save(&self, key: &str, value: &str) -> Result<()> {
        let lock_file = self.acquire_lock()?;

        let path = self.path_for(key);
        let tmp_path = path.with_extension("json.tmp");

        let mut file = File::create(&tmp_path).map_err(|e| {
            ConvoKitError::with_source(
                ErrorCode::StorageWriteError,
                format!("Failed to create temporary file: {}", tmp_path.display()),
                e,
            )
        })?;
        file.write_all(value.as_bytes()).map_err(|e| {
            ConvoKitError::with_source(ErrorCode::StorageWriteError, "Failed to write value", e)
        })?;
        file.sync_all().map_err(|e| {
            ConvoKitError::with_source(ErrorCode::StorageWriteError, "Failed to sync value", e)
        })?;
        drop(file);

        fs::rename(&tmp_path, &path).map_err(|e| {
            ConvoKitError::with_source(
                ErrorCode::StorageWriteError,
                format!("Failed to move value into place: {}", path.display()),
                e,
            )
        })?;

        drop(lock_file);
        tracing::debug!(key = %key, "Stored value: {}", path.display());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let path = self.path_for(key);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ConvoKitError::with_source(
                ErrorCode::StorageWriteError,
                format!("Failed to remove stored value: {}", path.display()),
                e,
            )),
        }
    }
}

/// In-memory store, mainly for tests.
#[derive(Default)]
pub struct MemoryStore {
    values: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SecureStore for MemoryStore {
    fn load(&self, key: &str) -> Result<Option<String>> {
        Ok(self.values.read().get(key).cloned())
    }

    fn save(&self, key: &str, value: &str) -> Result<()> {
        self.values
            .write()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.values.write().remove(key);
        Ok(())
    }
}
