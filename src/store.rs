use log::{debug, warn};
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;

use crate::color::NamedColor;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage I/O failed for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid storage key {0:?}")]
    InvalidKey(String),
    #[error("failed to encode saved colors: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Minimal byte-blob key-value storage.
pub trait KeyValueStore: Send + Sync {
    /// `None` when nothing was ever written under `key` or it cannot be read.
    fn get(&self, key: &str) -> Option<Vec<u8>>;
    fn set(&self, key: &str, value: &[u8]) -> Result<(), StoreError>;
}

/// One file per key inside a data directory.
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// `dir` is created on the first write.
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StoreError> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.')
            && !key.starts_with('.');
        if !valid {
            return Err(StoreError::InvalidKey(key.to_string()));
        }
        Ok(self.dir.join(format!("{}.json", key)))
    }

    fn io_error(path: &Path, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<Vec<u8>> {
        let path = self.path_for(key).ok()?;
        match std::fs::read(&path) {
            Ok(bytes) => Some(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No stored value for key {:?}", key);
                None
            }
            Err(e) => {
                warn!("Failed to read {}: {}", path.display(), e);
                None
            }
        }
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        let path = self.path_for(key)?;
        std::fs::create_dir_all(&self.dir).map_err(|e| Self::io_error(&self.dir, e))?;

        // Write beside the target then rename so a crash never leaves half a blob.
        let tmp_path = path.with_extension("json.tmp");
        let mut file = std::fs::File::create(&tmp_path).map_err(|e| Self::io_error(&tmp_path, e))?;
        file.write_all(value).map_err(|e| Self::io_error(&tmp_path, e))?;
        file.sync_all().map_err(|e| Self::io_error(&tmp_path, e))?;
        std::fs::rename(&tmp_path, &path).map_err(|e| Self::io_error(&path, e))?;

        debug!("Wrote {} bytes to {}", value.len(), path.display());
        Ok(())
    }
}

/// In-process store, lost on drop.
#[derive(Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.values.lock().ok()?.get(key).cloned()
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        if let Ok(mut values) = self.values.lock() {
            values.insert(key.to_string(), value.to_vec());
        }
        Ok(())
    }
}

/// The saved color list, kept as one JSON array under one key.
pub struct ItemStore<S: KeyValueStore> {
    backend: S,
    key: String,
}

impl<S: KeyValueStore> ItemStore<S> {
    pub fn new(backend: S, key: &str) -> Self {
        Self {
            backend,
            key: key.to_string(),
        }
    }

    pub fn backend(&self) -> &S {
        &self.backend
    }

    /// Saved colors, or an empty list when nothing is stored or the stored
    /// blob does not decode.
    pub fn load(&self) -> Vec<NamedColor> {
        let Some(bytes) = self.backend.get(&self.key) else {
            debug!("No values for key {:?}", self.key);
            return Vec::new();
        };

        match serde_json::from_slice(&bytes) {
            Ok(items) => items,
            Err(e) => {
                warn!("Error decoding saved colors under {:?}: {}", self.key, e);
                Vec::new()
            }
        }
    }

    /// Overwrites the stored list with `items`.
    pub fn save(&self, items: &[NamedColor]) -> Result<(), StoreError> {
        let encoded = serde_json::to_vec(items)?;
        self.backend.set(&self.key, &encoded)
    }
}
