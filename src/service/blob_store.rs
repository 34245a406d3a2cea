//! Attachment storage.
//!
//! Attachments live in an external blob store keyed by `<kind>/<file name>`,
//! where kind is `photos`, `videos` or `documents`. [`LocalBlobStore`] writes
//! under a directory served by the gateway; [`MemoryBlobStore`] keeps
//! uploads in memory for tests.

use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::AttachmentKind;
use crate::error::BlobError;

/// Store that turns uploaded bytes into a retrievable URL.
#[async_trait]
pub trait BlobStore: Send + Sync + std::fmt::Debug {
    /// Stores `bytes` at `path` and returns its URL.
    async fn upload(&self, bytes: Vec<u8>, path: &str) -> Result<String, BlobError>;
}

/// Builds the store path for an attachment.
///
/// The file name is reduced to its last component and stripped of anything
/// other than ASCII alphanumerics, `.`, `-` and `_`; it is prefixed with a
/// short unique token so repeated names do not collide.
#[must_use]
pub fn blob_path(kind: AttachmentKind, file_name: &str) -> String {
    let base = file_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default();
    let mut cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    cleaned = cleaned.trim_start_matches('.').to_string();
    if cleaned.is_empty() {
        cleaned = "upload".to_string();
    }
    let token = uuid::Uuid::new_v4().simple().to_string();
    let token: String = token.chars().take(8).collect();
    format!("{}/{token}-{cleaned}", kind.dir())
}

/// Rejects absolute paths and `..` so uploads stay under the store root.
fn relative_path(path: &str) -> Result<PathBuf, BlobError> {
    let candidate = Path::new(path);
    let safe = !path.is_empty()
        && candidate
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
    if safe {
        Ok(candidate.to_path_buf())
    } else {
        Err(BlobError::InvalidPath(path.to_string()))
    }
}

/// Filesystem blob store.
#[derive(Debug, Clone)]
pub struct LocalBlobStore {
    root: PathBuf,
    public_url: String,
}

impl LocalBlobStore {
    /// Creates a store rooted at `root` whose files are served at
    /// `public_url`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, public_url: &str) -> Self {
        Self {
            root: root.into(),
            public_url: public_url.trim_end_matches('/').to_string(),
        }
    }

    /// Directory uploads are written under.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn upload(&self, bytes: Vec<u8>, path: &str) -> Result<String, BlobError> {
        let relative = relative_path(path)?;
        let target = self.root.join(&relative);
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&target, &bytes).await?;
        tracing::debug!(path, size = bytes.len(), "attachment stored");
        Ok(format!("{}/{path}", self.public_url))
    }
}

/// In-memory blob store.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    blobs: RwLock<BTreeMap<String, Vec<u8>>>,
    fail_on: Option<String>,
}

impl MemoryBlobStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rejects uploads whose path starts with `prefix`.
    #[must_use]
    pub fn failing_on(prefix: &str) -> Self {
        Self {
            blobs: RwLock::default(),
            fail_on: Some(prefix.to_string()),
        }
    }

    /// Paths stored so far, sorted.
    pub async fn paths(&self) -> Vec<String> {
        self.blobs.read().await.keys().cloned().collect()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn upload(&self, bytes: Vec<u8>, path: &str) -> Result<String, BlobError> {
        relative_path(path)?;
        if let Some(prefix) = &self.fail_on
            && path.starts_with(prefix.as_str())
        {
            return Err(BlobError::Rejected(format!("upload to {path} refused")));
        }
        self.blobs.write().await.insert(path.to_string(), bytes);
        Ok(format!("memory://{path}"))
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn blob_path_is_namespaced_and_sanitized() {
        let path = blob_path(AttachmentKind::Photo, "../../etc/my car.jpg");
        assert!(path.starts_with("photos/"));
        assert!(path.ends_with("-my_car.jpg"));
        assert!(!path.contains(".."));

        let path = blob_path(AttachmentKind::Document, "");
        assert!(path.starts_with("documents/"));
        assert!(path.ends_with("-upload"));
    }

    #[test]
    fn relative_path_rejects_escapes() {
        assert!(relative_path("photos/a.jpg").is_ok());
        assert!(relative_path("../a.jpg").is_err());
        assert!(relative_path("/etc/passwd").is_err());
        assert!(relative_path("").is_err());
    }

    #[tokio::test]
    async fn local_store_writes_file_and_returns_url() {
        let Ok(dir) = tempfile::tempdir() else {
            panic!("tempdir");
        };
        let store = LocalBlobStore::new(dir.path(), "http://localhost:3000/blobs/");
        let url = tokio_test::assert_ok!(store.upload(b"jpeg".to_vec(), "photos/a.jpg").await);
        assert_eq!(url, "http://localhost:3000/blobs/photos/a.jpg");
        let written = tokio::fs::read(dir.path().join("photos/a.jpg")).await;
        assert_eq!(written.ok(), Some(b"jpeg".to_vec()));
    }

    #[tokio::test]
    async fn memory_store_can_fail_by_prefix() {
        let store = MemoryBlobStore::failing_on("videos/");
        tokio_test::assert_ok!(store.upload(Vec::new(), "photos/a.jpg").await);
        let result = store.upload(Vec::new(), "videos/b.mp4").await;
        assert!(matches!(result, Err(BlobError::Rejected(_))));
        assert_eq!(store.paths().await, vec!["photos/a.jpg".to_string()]);
    }
}
