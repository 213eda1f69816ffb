//! Filesystem image blob store

use async_trait::async_trait;
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::domain::repositories::BlobStore;

/// Blobs stored as flat files under one root directory
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, filename: &str) -> io::Result<PathBuf> {
        // Blob names are flat; anything that could escape the root is refused
        let valid = !filename.is_empty()
            && !filename.contains(['/', '\\'])
            && filename != "."
            && filename != "..";
        if !valid {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid blob name '{filename}'"),
            ));
        }
        Ok(self.root.join(filename))
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn exists(&self, filename: &str) -> io::Result<bool> {
        fs::try_exists(self.path_for(filename)?).await
    }

    async fn delete(&self, filename: &str) -> io::Result<bool> {
        match fs::remove_file(self.path_for(filename)?).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn write(&self, filename: &str, bytes: &[u8]) -> io::Result<()> {
        let path = self.path_for(filename)?;
        fs::create_dir_all(&self.root).await?;

        // Write under a temporary name so readers never see a partial image
        let tmp = self.root.join(format!(".{filename}.part"));
        fs::write(&tmp, bytes).await?;
        fs::rename(&tmp, &path).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn write_exists_delete() {
        let dir = tempdir().unwrap();
        let store = FsBlobStore::new(dir.path().join("images"));

        assert!(!store.exists("a.jpg").await.unwrap());
        store.write("a.jpg", b"jpeg").await.unwrap();
        assert!(store.exists("a.jpg").await.unwrap());

        assert!(store.delete("a.jpg").await.unwrap());
        assert!(!store.delete("a.jpg").await.unwrap());
        assert!(!store.exists("a.jpg").await.unwrap());
    }

    #[tokio::test]
    async fn rejects_path_traversal() {
        let dir = tempdir().unwrap();
        let store = FsBlobStore::new(dir.path());

        assert!(store.write("../evil.jpg", b"x").await.is_err());
        assert!(store.exists("..").await.is_err());
    }
}
