//! Remote blob store contract and backends.
//!
//! Keys are `"{site_id}/{relative_path}"`. The store is opaque: nothing here
//! knows whether it is an object bucket, a directory or a test double.

use std::collections::{BTreeMap, BTreeSet};
use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::Mutex;
use thiserror::Error;
use tokio::fs;
use tracing::debug;

use crate::storage::StorageError;

/// Errors from a remote store.
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("remote io error on {key}: {source}")]
    Io {
        key: String,
        #[source]
        source: io::Error,
    },

    #[error("invalid remote key: {0}")]
    InvalidKey(String),

    #[error("remote refused {key}: {reason}")]
    Refused { key: String, reason: String },
}

impl RemoteError {
    pub fn key(&self) -> &str {
        match self {
            Self::Io { key, .. } | Self::Refused { key, .. } => key,
            Self::InvalidKey(key) => key,
        }
    }
}

impl From<RemoteError> for StorageError {
    fn from(err: RemoteError) -> Self {
        StorageError::RemoteUnavailable {
            key: err.key().to_string(),
            reason: err.to_string(),
        }
    }
}

pub type RemoteResult<T> = Result<T, RemoteError>;

/// A listed remote object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteObject {
    pub key: String,
    pub size: u64,
}

/// Key-value blob storage for published site content.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Fetch an object, `None` if it does not exist.
    async fn get(&self, key: &str) -> RemoteResult<Option<Vec<u8>>>;

    /// Store an object, replacing any previous value.
    async fn put(&self, key: &str, data: &[u8], content_type: &str) -> RemoteResult<()>;

    /// Objects whose key starts with `prefix`, sorted by key.
    async fn list(&self, prefix: &str) -> RemoteResult<Vec<RemoteObject>>;

    /// Delete an object. Deleting a missing key succeeds.
    async fn delete(&self, key: &str) -> RemoteResult<()>;
}

fn validate_key(key: &str) -> RemoteResult<()> {
    let bad = key.is_empty()
        || key.starts_with('/')
        || key.contains('\\')
        || key.split('/').any(|s| s.is_empty() || s == "." || s == "..");
    if bad {
        return Err(RemoteError::InvalidKey(key.to_string()));
    }
    Ok(())
}

/// A remote store backed by a local directory, one file per key.
#[derive(Debug, Clone)]
pub struct DirectoryStore {
    root: PathBuf,
}

impl DirectoryStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn object_path(&self, key: &str) -> RemoteResult<PathBuf> {
        validate_key(key)?;
        Ok(self.root.join(key))
    }

    fn io_error(key: &str, source: io::Error) -> RemoteError {
        RemoteError::Io {
            key: key.to_string(),
            source,
        }
    }
}

#[async_trait]
impl RemoteStore for DirectoryStore {
    async fn get(&self, key: &str) -> RemoteResult<Option<Vec<u8>>> {
        let path = self.object_path(key)?;
        match fs::read(&path).await {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Self::io_error(key, e)),
        }
    }

    async fn put(&self, key: &str, data: &[u8], content_type: &str) -> RemoteResult<()> {
        let path = self.object_path(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| Self::io_error(key, e))?;
        }
        fs::write(&path, data)
            .await
            .map_err(|e| Self::io_error(key, e))?;
        debug!(key, content_type, bytes = data.len(), "stored object");
        Ok(())
    }

    async fn list(&self, prefix: &str) -> RemoteResult<Vec<RemoteObject>> {
        let mut objects = Vec::new();
        let mut pending = vec![String::new()];

        while let Some(dir_key) = pending.pop() {
            let dir = self.root.join(&dir_key);
            let mut entries = match fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => return Err(Self::io_error(&dir_key, e)),
            };

            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(|e| Self::io_error(&dir_key, e))?
            {
                let name = entry.file_name().to_string_lossy().into_owned();
                let key = if dir_key.is_empty() {
                    name
                } else {
                    format!("{}/{}", dir_key, name)
                };
                let meta = entry
                    .metadata()
                    .await
                    .map_err(|e| Self::io_error(&key, e))?;

                if meta.is_dir() {
                    // only descend where the prefix can still match
                    let as_dir = format!("{}/", key);
                    if as_dir.starts_with(prefix) || prefix.starts_with(&as_dir) {
                        pending.push(key);
                    }
                } else if key.starts_with(prefix) {
                    objects.push(RemoteObject {
                        key,
                        size: meta.len(),
                    });
                }
            }
        }

        objects.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(objects)
    }

    async fn delete(&self, key: &str) -> RemoteResult<()> {
        let path = self.object_path(key)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Self::io_error(key, e)),
        }
    }
}

#[derive(Debug, Clone)]
struct StoredObject {
    data: Vec<u8>,
    content_type: String,
}

/// An in-memory remote store with per-key failure injection.
#[derive(Debug, Default)]
pub struct MemoryStore {
    objects: Mutex<BTreeMap<String, StoredObject>>,
    failing: Mutex<BTreeSet<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an object directly.
    pub fn insert(&self, key: impl Into<String>, data: impl Into<Vec<u8>>) {
        self.objects.lock().insert(
            key.into(),
            StoredObject {
                data: data.into(),
                content_type: "application/octet-stream".to_string(),
            },
        );
    }

    /// Make every operation on `key` fail.
    pub fn fail_on(&self, key: impl Into<String>) {
        self.failing.lock().insert(key.into());
    }

    pub fn keys(&self) -> Vec<String> {
        self.objects.lock().keys().cloned().collect()
    }

    pub fn content_type(&self, key: &str) -> Option<String> {
        self.objects.lock().get(key).map(|o| o.content_type.clone())
    }

    fn check(&self, key: &str) -> RemoteResult<()> {
        validate_key(key)?;
        if self.failing.lock().contains(key) {
            return Err(RemoteError::Refused {
                key: key.to_string(),
                reason: "injected failure".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteStore for MemoryStore {
    async fn get(&self, key: &str) -> RemoteResult<Option<Vec<u8>>> {
        self.check(key)?;
        Ok(self.objects.lock().get(key).map(|o| o.data.clone()))
    }

    async fn put(&self, key: &str, data: &[u8], content_type: &str) -> RemoteResult<()> {
        self.check(key)?;
        self.objects.lock().insert(
            key.to_string(),
            StoredObject {
                data: data.to_vec(),
                content_type: content_type.to_string(),
            },
        );
        Ok(())
    }

    async fn list(&self, prefix: &str) -> RemoteResult<Vec<RemoteObject>> {
        Ok(self
            .objects
            .lock()
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .map(|(key, object)| RemoteObject {
                key: key.clone(),
                size: object.data.len() as u64,
            })
            .collect())
    }

    async fn delete(&self, key: &str) -> RemoteResult<()> {
        self.check(key)?;
        self.objects.lock().remove(key);
        Ok(())
    }
}
