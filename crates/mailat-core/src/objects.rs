//! Object storage for raw messages and attachment bytes.

use std::collections::HashMap;
use std::future::Future;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::{Error, Result};

/// Container/key addressed blob storage.
pub trait ObjectStore: Send + Sync {
    /// Read an object.
    ///
    /// Returns [`Error::ObjectNotFound`] when nothing is stored under the key.
    fn fetch(&self, container: &str, key: &str) -> impl Future<Output = Result<Vec<u8>>> + Send;

    /// Write an object, replacing any previous content.
    fn put(
        &self,
        container: &str,
        key: &str,
        bytes: Vec<u8>,
    ) -> impl Future<Output = Result<()>> + Send;
}

/// Objects stored as files under a root directory, one sub-directory per
/// container.
#[derive(Debug, Clone)]
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    /// Create a store rooted at `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_of(&self, container: &str, key: &str) -> Result<PathBuf> {
        let mut path = self.root.clone();
        for part in [container, key] {
            let relative = Path::new(part);
            if part.is_empty()
                || relative
                    .components()
                    .any(|c| !matches!(c, Component::Normal(_)))
            {
                return Err(Error::InvalidObjectPath(format!("{container}/{key}")));
            }
            path.push(relative);
        }
        Ok(path)
    }
}

impl ObjectStore for FsObjectStore {
    async fn fetch(&self, container: &str, key: &str) -> Result<Vec<u8>> {
        let path = self.path_of(container, key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(Error::ObjectNotFound {
                container: container.to_string(),
                key: key.to_string(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    async fn put(&self, container: &str, key: &str, bytes: Vec<u8>) -> Result<()> {
        let path = self.path_of(container, key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, bytes).await?;
        Ok(())
    }
}

/// Objects held in process memory. Clones share the same contents.
#[derive(Debug, Clone, Default)]
pub struct MemoryObjectStore {
    objects: Arc<RwLock<HashMap<(String, String), Vec<u8>>>>,
}

impl MemoryObjectStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored objects.
    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    /// Whether the store is empty.
    pub async fn is_empty(&self) -> bool {
        self.objects.read().await.is_empty()
    }

    /// Keys stored in a container, sorted.
    pub async fn keys(&self, container: &str) -> Vec<String> {
        let mut keys: Vec<String> = self
            .objects
            .read()
            .await
            .keys()
            .filter(|(c, _)| c == container)
            .map(|(_, k)| k.clone())
            .collect();
        keys.sort();
        keys
    }
}

impl ObjectStore for MemoryObjectStore {
    async fn fetch(&self, container: &str, key: &str) -> Result<Vec<u8>> {
        self.objects
            .read()
            .await
            .get(&(container.to_string(), key.to_string()))
            .cloned()
            .ok_or_else(|| Error::ObjectNotFound {
                container: container.to_string(),
                key: key.to_string(),
            })
    }

    async fn put(&self, container: &str, key: &str, bytes: Vec<u8>) -> Result<()> {
        self.objects
            .write()
            .await
            .insert((container.to_string(), key.to_string()), bytes);
        Ok(())
    }
}
