//! services/api/src/adapters/storage.rs
//!
//! Local-disk implementation of the `AssetStorage` port. Uploaded assets live
//! under one root directory and are referenced as `/uploads/<files|images>/<name>`.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use library_core::domain::AssetKind;
use library_core::ports::{AssetStorage, PortError, PortResult};
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;

/// URL prefix under which every asset reference lives.
pub const UPLOADS_PREFIX: &str = "/uploads/";

#[derive(Clone, Debug)]
pub struct LocalAssetStorage {
    root: PathBuf,
}

impl LocalAssetStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Maps a reference onto a path below the root. Anything that could escape
    /// the root (absolute parts, `..`) is rejected.
    fn resolve(&self, reference: &str) -> Option<PathBuf> {
        let relative = Path::new(reference.strip_prefix(UPLOADS_PREFIX)?);
        if relative.as_os_str().is_empty()
            || !relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)))
        {
            return None;
        }
        Some(self.root.join(relative))
    }
}

/// `<unix millis>-<random><.ext>`; the extension is kept only if it is plain ASCII.
fn stored_file_name(original_name: &str) -> String {
    let extension = Path::new(original_name)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty() && e.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|e| format!(".{}", e.to_ascii_lowercase()))
        .unwrap_or_default();
    let suffix = Uuid::new_v4().simple().to_string();

    format!(
        "{}-{}{}",
        Utc::now().timestamp_millis(),
        &suffix[..8],
        extension
    )
}

#[async_trait]
impl AssetStorage for LocalAssetStorage {
    async fn store(&self, kind: AssetKind, original_name: &str, data: Bytes) -> PortResult<String> {
        let directory = self.root.join(kind.directory());
        tokio::fs::create_dir_all(&directory)
            .await
            .map_err(|e| PortError::Unavailable(format!("cannot create {:?}: {}", directory, e)))?;

        let file_name = stored_file_name(original_name);
        let path = directory.join(&file_name);
        tokio::fs::write(&path, &data)
            .await
            .map_err(|e| PortError::Unexpected(format!("cannot write {:?}: {}", path, e)))?;

        debug!("Stored {} bytes at {:?}", data.len(), path);
        Ok(format!("{}{}/{}", UPLOADS_PREFIX, kind.directory(), file_name))
    }

    async fn locate(&self, reference: &str) -> PortResult<Option<PathBuf>> {
        let Some(path) = self.resolve(reference) else {
            warn!("Rejected asset reference {:?}", reference);
            return Ok(None);
        };

        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => Ok(Some(path)),
            Ok(_) => Ok(None),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(PortError::Unexpected(format!("cannot stat {:?}: {}", path, e))),
        }
    }

    async fn remove(&self, reference: &str) -> PortResult<()> {
        let Some(path) = self.resolve(reference) else {
            return Ok(());
        };

        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(PortError::Unexpected(format!("cannot remove {:?}: {}", path, e))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stored_assets_can_be_located_and_removed() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalAssetStorage::new(dir.path());

        let reference = storage
            .store(AssetKind::Document, "Moby Dick.PDF", Bytes::from_static(b"%PDF-1.4"))
            .await
            .unwrap();
        assert!(reference.starts_with("/uploads/files/"));
        assert!(reference.ends_with(".pdf"));

        let path = storage.locate(&reference).await.unwrap().unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"%PDF-1.4");

        storage.remove(&reference).await.unwrap();
        assert!(storage.locate(&reference).await.unwrap().is_none());
        // Removing twice is fine.
        storage.remove(&reference).await.unwrap();
    }

    #[tokio::test]
    async fn traversal_references_are_never_resolved() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalAssetStorage::new(dir.path().join("uploads"));
        std::fs::write(dir.path().join("secret.txt"), b"nope").unwrap();

        assert!(storage.locate("/uploads/../secret.txt").await.unwrap().is_none());
        assert!(storage.locate("/etc/passwd").await.unwrap().is_none());
        assert!(storage.locate("/uploads/").await.unwrap().is_none());
    }

    #[test]
    fn odd_extensions_are_dropped() {
        assert!(!stored_file_name("cover.p/ng").contains('/'));
        assert!(stored_file_name("cover.PNG").ends_with(".png"));
        assert!(!stored_file_name("noext").contains('.'));
    }
}
