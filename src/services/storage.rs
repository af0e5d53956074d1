use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Where uploaded files live between ingress and the worker.
///
/// Server and worker must agree on the paths returned by [`StorageService::save`],
/// so both point at the same directory.
#[async_trait]
pub trait StorageService: Send + Sync {
    /// Writes `data` under `filename`, replacing any existing file, and returns its path.
    async fn save(&self, filename: &str, data: &[u8]) -> Result<PathBuf>;

    async fn delete(&self, path: &Path) -> Result<()>;

    async fn exists(&self, path: &Path) -> bool;

    fn root(&self) -> &Path;
}

pub struct LocalStorageService {
    root: PathBuf,
}

impl LocalStorageService {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Creates the storage directory if it does not exist yet.
    pub async fn ensure_root(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .with_context(|| format!("Failed to create upload folder {}", self.root.display()))
    }
}

#[async_trait]
impl StorageService for LocalStorageService {
    async fn save(&self, filename: &str, data: &[u8]) -> Result<PathBuf> {
        let path = self.root.join(filename);
        tokio::fs::write(&path, data)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(path)
    }

    async fn delete(&self, path: &Path) -> Result<()> {
        match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("Failed to delete {}", path.display())),
        }
    }

    async fn exists(&self, path: &Path) -> bool {
        tokio::fs::try_exists(path).await.unwrap_or(false)
    }

    fn root(&self) -> &Path {
        &self.root
    }
}
