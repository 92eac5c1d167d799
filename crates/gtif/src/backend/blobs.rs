//! Filesystem blob storage.
//!
//! Objects are plain files under a root directory, addressed by their
//! slash-separated key. Uploads never overwrite an existing object.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use tokio::io::AsyncWriteExt;
use tracing::debug;

use super::{BlobReceipt, BlobStore};
use crate::error::{Error, Result};

/// Blob store writing to a local directory.
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    root: PathBuf,
    public_base_url: Option<String>,
}

impl FsBlobStore {
    /// Create a store rooted at `root`.
    ///
    /// When `public_base_url` is set, object URLs are `{base}/{key}`;
    /// otherwise they are `file://` URLs of the stored files.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, public_base_url: Option<String>) -> Self {
        Self {
            root: root.into(),
            public_base_url: public_base_url.map(|u| u.trim_end_matches('/').to_string()),
        }
    }

    /// The root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a key to its file, refusing keys that would leave the root.
    fn object_path(&self, key: &str) -> Result<PathBuf> {
        if key.is_empty() || key.starts_with('/') || key.ends_with('/') {
            return Err(Error::blob_key(key, "must be a relative object name"));
        }
        let relative = Path::new(key);
        if !relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)))
        {
            return Err(Error::blob_key(key, "must not contain '.' or '..' segments"));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait::async_trait]
impl BlobStore for FsBlobStore {
    async fn put(&self, key: &str, bytes: Arc<[u8]>, content_type: &str) -> Result<BlobReceipt> {
        let path = self.object_path(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| Error::DirectoryCreate {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }

        let mut file = match tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                return Err(Error::BlobExists {
                    key: key.to_string(),
                })
            }
            Err(e) => return Err(e.into()),
        };
        file.write_all(&bytes).await?;
        file.sync_all().await?;

        let receipt = BlobReceipt::for_bytes(key, &bytes);
        debug!(
            key,
            content_type,
            size = receipt.size,
            hash = %&receipt.content_hash[..16],
            "Blob stored"
        );
        Ok(receipt)
    }

    async fn public_url(&self, key: &str) -> Result<String> {
        let path = self.object_path(key)?;
        if !tokio::fs::try_exists(&path).await? {
            return Err(Error::BlobNotFound {
                key: key.to_string(),
            });
        }

        if let Some(base) = &self.public_base_url {
            return Ok(format!("{base}/{key}"));
        }
        let absolute = tokio::fs::canonicalize(&path).await?;
        Ok(format!("file://{}", absolute.display()))
    }
}
