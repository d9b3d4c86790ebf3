/*
 * SPDX-FileCopyrightText: 2026 Wavelens GmbH <info@wavelens.io>
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tempfile::NamedTempFile;
use tracing::debug;
use uuid::Uuid;

/// Key/bytes blob space. Keys are never rewritten once populated.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Vec<u8>>;
    async fn put(&self, key: &str, data: Vec<u8>, content_type: &str) -> Result<()>;
    async fn delete(&self, key: &str) -> Result<()>;
    async fn exists(&self, key: &str) -> Result<bool>;
}

/// Object store backed by a directory, one file per key.
#[derive(Debug, Clone)]
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    pub async fn new(root: impl Into<PathBuf>, bucket: &str) -> Result<Self> {
        let root = root.into().join(bucket);
        tokio::fs::create_dir_all(&root)
            .await
            .with_context(|| format!("Failed to create storage directory {}", root.display()))?;
        Ok(Self { root })
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        if key.is_empty() || key.contains('/') || key.contains('\\') || key.starts_with('.') {
            anyhow::bail!("Invalid storage key `{}`", key);
        }
        Ok(self.root.join(key))
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        let path = self.path_for(key)?;
        tokio::fs::read(&path)
            .await
            .with_context(|| format!("Failed to read object {}", key))
    }

    async fn put(&self, key: &str, data: Vec<u8>, content_type: &str) -> Result<()> {
        let path = self.path_for(key)?;
        // Readers must never see a half written key.
        let staging = self.root.join(format!(".{}.{}", key, Uuid::new_v4()));
        tokio::fs::write(&staging, &data)
            .await
            .with_context(|| format!("Failed to stage object {}", key))?;
        tokio::fs::rename(&staging, &path)
            .await
            .with_context(|| format!("Failed to publish object {}", key))?;
        debug!(key = %key, content_type = %content_type, size = data.len(), "Stored object");
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("Failed to delete object {}", key)),
        }
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let path = self.path_for(key)?;
        Ok(tokio::fs::try_exists(&path).await.unwrap_or(false))
    }
}

/// In-process object store for tests and single node development setups.
#[derive(Debug, Default)]
pub struct MemoryObjectStore {
    objects: Mutex<HashMap<String, (Vec<u8>, String)>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.objects.lock().map(|o| o.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn content_type(&self, key: &str) -> Option<String> {
        self.objects
            .lock()
            .ok()
            .and_then(|o| o.get(key).map(|(_, content_type)| content_type.clone()))
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        let objects = self
            .objects
            .lock()
            .map_err(|_| anyhow::anyhow!("Object store poisoned"))?;
        objects
            .get(key)
            .map(|(data, _)| data.clone())
            .with_context(|| format!("Object {} not found", key))
    }

    async fn put(&self, key: &str, data: Vec<u8>, content_type: &str) -> Result<()> {
        let mut objects = self
            .objects
            .lock()
            .map_err(|_| anyhow::anyhow!("Object store poisoned"))?;
        objects.insert(key.to_string(), (data, content_type.to_string()));
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut objects = self
            .objects
            .lock()
            .map_err(|_| anyhow::anyhow!("Object store poisoned"))?;
        objects.remove(key);
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let objects = self
            .objects
            .lock()
            .map_err(|_| anyhow::anyhow!("Object store poisoned"))?;
        Ok(objects.contains_key(key))
    }
}

/// Ephemeral local copy of a stored object. The file is unlinked on `release` or drop.
#[derive(Debug)]
pub struct LocalFile {
    key: String,
    file: NamedTempFile,
}

impl LocalFile {
    pub async fn fetch(store: &dyn ObjectStore, key: &str, dir: &Path) -> Result<Self> {
        let data = store.get(key).await?;
        Self::from_bytes(key, &data, dir).await
    }

    pub async fn from_bytes(key: &str, data: &[u8], dir: &Path) -> Result<Self> {
        let file = tempfile::Builder::new()
            .prefix("shotline-")
            .tempfile_in(dir)
            .with_context(|| format!("Failed to create local file in {}", dir.display()))?;
        tokio::fs::write(file.path(), data)
            .await
            .with_context(|| format!("Failed to write local copy of {}", key))?;
        Ok(Self {
            key: key.to_string(),
            file,
        })
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub async fn read(&self) -> Result<Vec<u8>> {
        tokio::fs::read(self.path())
            .await
            .with_context(|| format!("Failed to read local copy of {}", self.key))
    }

    pub fn release(self) -> Result<()> {
        let key = self.key;
        self.file
            .close()
            .with_context(|| format!("Failed to unlink local copy of {}", key))
    }
}
