//! File-backed anonymous identity.
//!
//! The first sign-in generates a random uid and stores it; later sign-ins
//! on the same machine reuse it, the way a hosted anonymous account
//! persists across page loads.

use std::path::{Path, PathBuf};

use tokio::sync::watch;
use tracing::debug;

use super::{IdentityService, Uid};
use crate::error::{Error, Result};

/// Anonymous identity persisted in a small file.
#[derive(Debug)]
pub struct LocalIdentity {
    path: PathBuf,
    state: watch::Sender<Option<Uid>>,
}

impl LocalIdentity {
    /// Create an identity stored at `path`. Nothing is read until sign-in.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let (state, _) = watch::channel(None);
        Self {
            path: path.into(),
            state,
        }
    }

    /// Path of the identity file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load_or_create(&self) -> std::io::Result<Uid> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) if !raw.trim().is_empty() => return Ok(Uid(raw.trim().to_string())),
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let uid = Uid(uuid::Uuid::new_v4().to_string());
        tokio::fs::write(&self.path, uid.0.as_bytes()).await?;
        debug!(path = %self.path.display(), "Created anonymous identity");
        Ok(uid)
    }
}

#[async_trait::async_trait]
impl IdentityService for LocalIdentity {
    async fn sign_in_anonymously(&self) -> Result<Uid> {
        let uid = self.load_or_create().await.map_err(|e| {
            Error::identity(format!(
                "cannot use identity file {}: {e}",
                self.path.display()
            ))
        })?;
        self.state.send_replace(Some(uid.clone()));
        Ok(uid)
    }

    fn subscribe(&self) -> watch::Receiver<Option<Uid>> {
        self.state.subscribe()
    }
}
