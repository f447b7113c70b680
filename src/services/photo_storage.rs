//! Photo blob storage
//!
//! Photo bytes live outside the database. The service only sees the
//! `PhotoStorage` trait; `LocalPhotoStorage` writes files into the upload
//! directory that the HTTP layer serves under `/photos/`.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;

#[async_trait]
pub trait PhotoStorage: Send + Sync {
    /// Store `data` under `file_name`, returning the private path.
    async fn save(&self, file_name: &str, data: &[u8]) -> Result<String>;

    /// Remove a stored photo. Missing files are not an error.
    async fn delete(&self, private_path: &str) -> Result<()>;
}

pub type DynPhotoStorage = Arc<dyn PhotoStorage>;

/// Filesystem-backed storage rooted at one directory
pub struct LocalPhotoStorage {
    root: PathBuf,
}

impl LocalPhotoStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn boxed(root: impl Into<PathBuf>) -> DynPhotoStorage {
        Arc::new(Self::new(root))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    async fn ensure_root(&self) -> Result<()> {
        if !self.root.exists() {
            fs::create_dir_all(&self.root)
                .await
                .with_context(|| format!("Failed to create photo dir {}", self.root.display()))?;
        }
        Ok(())
    }
}

#[async_trait]
impl PhotoStorage for LocalPhotoStorage {
    async fn save(&self, file_name: &str, data: &[u8]) -> Result<String> {
        self.ensure_root().await?;
        let path = self.root.join(file_name);
        fs::write(&path, data)
            .await
            .with_context(|| format!("Failed to write photo {}", path.display()))?;
        Ok(path.to_string_lossy().into_owned())
    }

    async fn delete(&self, private_path: &str) -> Result<()> {
        match fs::remove_file(private_path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("Photo already gone: {}", private_path);
                Ok(())
            }
            Err(e) => Err(e).with_context(|| format!("Failed to delete photo {}", private_path)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_save_creates_directory_and_file() {
        let dir = TempDir::new().unwrap();
        let storage = LocalPhotoStorage::new(dir.path().join("nested/photos"));

        let path = storage.save("a.png", b"png-bytes").await.unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"png-bytes");
        assert!(Path::new(&path).starts_with(storage.root()));
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let storage = LocalPhotoStorage::new(dir.path());

        let path = storage.save("b.jpg", b"jpeg").await.unwrap();
        storage.delete(&path).await.unwrap();
        assert!(!Path::new(&path).exists());
        storage.delete(&path).await.unwrap();
    }
}
