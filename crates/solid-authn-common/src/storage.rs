//! Pluggable asynchronous key-value storage.
//!
//! Sessions persist their state as string values under string keys so that
//! any backend a host already has (a browser's storage, a secrets service,
//! a plain file) can be slotted in. No cross-process locking is attempted:
//! when several processes share a backend, the last writer wins.

use async_trait::async_trait;
use miette::Diagnostic;
use serde_json::Value;
use std::collections::HashMap;
use std::error::Error as StdError;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;

/// Errors emitted by storage backends.
#[derive(Debug, thiserror::Error, Diagnostic)]
pub enum StorageError {
    /// Filesystem or I/O error
    #[error("I/O error: {0}")]
    #[diagnostic(code(solid_authn::storage::io))]
    Io(#[from] std::io::Error),
    /// Serialization error (e.g., JSON)
    #[error("serialization error: {0}")]
    #[diagnostic(code(solid_authn::storage::serde))]
    Serde(#[from] serde_json::Error),
    /// Any other error from a backend implementation
    #[error(transparent)]
    #[diagnostic(code(solid_authn::storage::other))]
    Other(#[from] Box<dyn StdError + Send + Sync>),
}

/// Asynchronous string key-value storage.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Get the value stored under `key`, if any.
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    /// Store `value` under `key`, replacing any previous value.
    async fn set(&self, key: &str, value: String) -> Result<(), StorageError>;
    /// Remove the value stored under `key`. Removing an absent key is not
    /// an error.
    async fn delete(&self, key: &str) -> Result<(), StorageError>;
}

/// In-memory storage suitable for short-lived sessions and tests.
#[derive(Default)]
pub struct MemoryStorage(RwLock<HashMap<String, String>>);

impl MemoryStorage {
    /// Create an empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.0.read().await.get(key).cloned())
    }
    async fn set(&self, key: &str, value: String) -> Result<(), StorageError> {
        self.0.write().await.insert(key.to_owned(), value);
        Ok(())
    }
    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.0.write().await.remove(key);
        Ok(())
    }
}

/// File-backed storage keeping all keys in one JSON object.
///
/// NOT secure, only suitable for development and tests: tokens end up in
/// plaintext on disk.
#[derive(Clone, Debug)]
pub struct FileStorage {
    /// Path to the JSON file.
    pub path: PathBuf,
}

impl FileStorage {
    /// Open (or create) a file store at the given path.
    pub fn new(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        if !path.as_ref().exists() {
            std::fs::write(path.as_ref(), b"{}")?;
        }
        Ok(Self {
            path: path.as_ref().to_path_buf(),
        })
    }

    fn read_map(&self) -> Result<serde_json::Map<String, Value>, StorageError> {
        let file = std::fs::read_to_string(&self.path)?;
        let store: Value = serde_json::from_str(&file)?;
        match store {
            Value::Object(map) => Ok(map),
            _ => Err(StorageError::Other("store file is not a JSON object".into())),
        }
    }

    fn write_map(&self, map: &serde_json::Map<String, Value>) -> Result<(), StorageError> {
        std::fs::write(&self.path, serde_json::to_string_pretty(map)?)?;
        Ok(())
    }
}

#[async_trait]
impl Storage for FileStorage {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let map = self.read_map()?;
        Ok(map.get(key).and_then(Value::as_str).map(str::to_owned))
    }
    async fn set(&self, key: &str, value: String) -> Result<(), StorageError> {
        let mut map = self.read_map()?;
        map.insert(key.to_owned(), Value::String(value));
        self.write_map(&map)
    }
    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let mut map = self.read_map()?;
        map.remove(key);
        self.write_map(&map)
    }
}
