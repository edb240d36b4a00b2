//! Read-only access to shipment documents kept on disk.

use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

use crate::errors::ServiceError;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("File not found: {0}")]
    NotFound(String),
    #[error("Invalid document path: {0}")]
    InvalidPath(String),
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(path) => {
                ServiceError::NotFound(format!("Document file {} is missing", path))
            }
            StorageError::InvalidPath(path) => {
                ServiceError::NotFound(format!("Document file {} is unavailable", path))
            }
            StorageError::Io(e) => ServiceError::ExternalServiceError(e.to_string()),
        }
    }
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn read(&self, path: &str) -> Result<Vec<u8>, StorageError>;
}

/// Accepts only non-empty relative paths without `..`, root or drive components.
pub fn validate_relative_path(path: &str) -> Result<PathBuf, StorageError> {
    let trimmed = path.trim();
    if trimmed.is_empty() {
        return Err(StorageError::InvalidPath(path.to_string()));
    }
    let candidate = Path::new(trimmed);
    let clean = candidate
        .components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
    if !clean {
        return Err(StorageError::InvalidPath(path.to_string()));
    }
    Ok(candidate.to_path_buf())
}

/// Documents under a directory on the local filesystem.
#[derive(Debug, Clone)]
pub struct LocalDocumentStore {
    root: PathBuf,
}

impl LocalDocumentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> Result<PathBuf, StorageError> {
        Ok(self.root.join(validate_relative_path(path)?))
    }
}

#[async_trait]
impl DocumentStore for LocalDocumentStore {
    async fn read(&self, path: &str) -> Result<Vec<u8>, StorageError> {
        let full_path = self.resolve(path)?;
        debug!(path = %full_path.display(), "reading document");
        match tokio::fs::read(&full_path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(path.to_string()))
            }
            Err(e) => {
                warn!(path = %full_path.display(), error = %e, "document read failed");
                Err(StorageError::Io(e))
            }
        }
    }
}

/// Content type guessed from the file extension.
pub fn content_type_for(path: &str) -> &'static str {
    let ext = Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("pdf") => "application/pdf",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("txt") => "text/plain; charset=utf-8",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[tokio::test]
    async fn reads_files_under_root() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("waybills")).unwrap();
        std::fs::write(dir.path().join("waybills/WB123.pdf"), b"%PDF-1.4").unwrap();

        let store = LocalDocumentStore::new(dir.path());
        let bytes = store.read("waybills/WB123.pdf").await.unwrap();
        assert_eq!(bytes, b"%PDF-1.4");
    }

    #[tokio::test]
    async fn missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalDocumentStore::new(dir.path());
        assert_matches!(store.read("nope.pdf").await, Err(StorageError::NotFound(_)));
    }

    #[tokio::test]
    async fn directory_read_is_an_io_failure() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("folder")).unwrap();
        let store = LocalDocumentStore::new(dir.path());
        let err = store.read("folder").await.unwrap_err();
        assert_matches!(err, StorageError::Io(_));
        assert_matches!(
            ServiceError::from(err),
            ServiceError::ExternalServiceError(_)
        );
    }

    #[test]
    fn rejects_escaping_paths() {
        assert!(validate_relative_path("../etc/passwd").is_err());
        assert!(validate_relative_path("/etc/passwd").is_err());
        assert!(validate_relative_path("a/../../b").is_err());
        assert!(validate_relative_path("  ").is_err());
        assert!(validate_relative_path("docs/pod.jpg").is_ok());
    }

    #[test]
    fn guesses_content_type() {
        assert_eq!(content_type_for("a/b/WB1.PDF"), "application/pdf");
        assert_eq!(content_type_for("photo.jpeg"), "image/jpeg");
        assert_eq!(content_type_for("blob"), "application/octet-stream");
    }
}
