//! Badge photo staging.
//!
//! A picked photo is held in memory until submission and exposed to the
//! rendering side through a preview address (`preview:<uuid>`). Addresses
//! are issued by a [`PreviewRegistry`] and owned by a [`PreviewRef`], which
//! releases its entry when dropped. [`PhotoSlot`] keeps at most one photo
//! and always drops the old preview before issuing a new one, so two live
//! previews never coexist.

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, trace};
use uuid::Uuid;

use crate::error::Result;

/// Media types accepted for badge photos.
pub const ACCEPTED_MEDIA_TYPES: [&str; 4] = ["image/jpeg", "image/png", "image/webp", "image/gif"];

/// Default size limit for badge photos (5 MiB).
pub const DEFAULT_MAX_PHOTO_BYTES: u64 = 5 * 1024 * 1024;

/// A file offered by the registrant.
#[derive(Clone, PartialEq, Eq)]
pub struct PhotoFile {
    /// Original file name, used to derive the upload extension.
    pub name: String,
    /// Declared media type.
    pub media_type: String,
    /// File contents.
    pub bytes: Arc<[u8]>,
}

impl std::fmt::Debug for PhotoFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PhotoFile")
            .field("name", &self.name)
            .field("media_type", &self.media_type)
            .field("size", &self.bytes.len())
            .finish()
    }
}

impl PhotoFile {
    /// Build a photo from its parts.
    #[must_use]
    pub fn new(name: impl Into<String>, media_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            media_type: media_type.into(),
            bytes: bytes.into(),
        }
    }

    /// Read a photo from disk, guessing the media type from its extension.
    ///
    /// At most `max_bytes + 1` bytes are read. A longer file comes back
    /// truncated to that length, which [`check_photo`] still rejects as
    /// too large.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read.
    pub fn read(path: &Path, max_bytes: u64) -> Result<Self> {
        let file = File::open(path)?;
        let len = file.metadata()?.len();
        let limit = max_bytes.saturating_add(1);
        let mut bytes = Vec::with_capacity(usize::try_from(len.min(limit)).unwrap_or(0));
        file.take(limit).read_to_end(&mut bytes)?;
        let media_type = mime_guess::from_path(path)
            .first_raw()
            .unwrap_or("application/octet-stream");
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self::new(name, media_type, bytes))
    }

    /// Size in bytes.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// Extension used for the uploaded object, `jpg` when the name has none.
    #[must_use]
    pub fn upload_extension(&self) -> String {
        Path::new(&self.name)
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
            .filter(|e| !e.is_empty() && e.chars().all(|c| c.is_ascii_alphanumeric()))
            .unwrap_or_else(|| "jpg".to_string())
    }
}

/// Why a picked file was not staged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AttachmentRejection {
    /// Not one of the accepted image types.
    #[error("Please upload an image file")]
    UnsupportedType,
    /// Over the size limit.
    #[error("Image is larger than 5 MB")]
    TooLarge,
}

/// Check a candidate against the accepted types, then the size limit.
///
/// # Errors
///
/// Returns the first [`AttachmentRejection`] that applies.
pub fn check_photo(file: &PhotoFile, max_bytes: u64) -> std::result::Result<(), AttachmentRejection> {
    let media_type = file.media_type.trim();
    if !ACCEPTED_MEDIA_TYPES
        .iter()
        .any(|t| t.eq_ignore_ascii_case(media_type))
    {
        return Err(AttachmentRejection::UnsupportedType);
    }
    if file.size() > max_bytes {
        return Err(AttachmentRejection::TooLarge);
    }
    Ok(())
}

/// A preview entry: what a renderer gets back for an address.
#[derive(Debug, Clone)]
pub struct PreviewSource {
    /// Media type of the staged image.
    pub media_type: String,
    /// Image bytes.
    pub bytes: Arc<[u8]>,
}

/// Table of live preview addresses.
///
/// Cloning shares the table.
#[derive(Debug, Clone, Default)]
pub struct PreviewRegistry {
    entries: Arc<Mutex<HashMap<String, PreviewSource>>>,
}

impl PreviewRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, PreviewSource>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Issue a new preview address for `file`.
    #[must_use]
    pub fn acquire(&self, file: &PhotoFile) -> PreviewRef {
        let address = format!("preview:{}", Uuid::new_v4());
        self.entries().insert(
            address.clone(),
            PreviewSource {
                media_type: file.media_type.clone(),
                bytes: file.bytes.clone(),
            },
        );
        trace!(%address, "Preview acquired");
        PreviewRef {
            address,
            registry: self.clone(),
        }
    }

    /// Look up a live preview.
    #[must_use]
    pub fn resolve(&self, address: &str) -> Option<PreviewSource> {
        self.entries().get(address).cloned()
    }

    /// Number of live previews.
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.entries().len()
    }

    fn release(&self, address: &str) {
        if self.entries().remove(address).is_some() {
            trace!(%address, "Preview released");
        }
    }
}

/// Owning handle to a preview address. Dropping it releases the address.
#[derive(Debug)]
pub struct PreviewRef {
    address: String,
    registry: PreviewRegistry,
}

impl PreviewRef {
    /// The address renderers use to fetch the preview.
    #[must_use]
    pub fn address(&self) -> &str {
        &self.address
    }
}

impl Drop for PreviewRef {
    fn drop(&mut self) {
        self.registry.release(&self.address);
    }
}

/// A staged photo together with its preview.
#[derive(Debug)]
pub struct PhotoAttachment {
    file: PhotoFile,
    preview: PreviewRef,
}

impl PhotoAttachment {
    /// The staged file.
    #[must_use]
    pub fn file(&self) -> &PhotoFile {
        &self.file
    }

    /// The preview address.
    #[must_use]
    pub fn preview_address(&self) -> &str {
        self.preview.address()
    }
}

/// Holds at most one staged photo.
#[derive(Debug)]
pub struct PhotoSlot {
    registry: PreviewRegistry,
    max_bytes: u64,
    current: Option<PhotoAttachment>,
}

impl PhotoSlot {
    /// Create an empty slot issuing previews from `registry`.
    #[must_use]
    pub fn new(registry: PreviewRegistry, max_bytes: u64) -> Self {
        Self {
            registry,
            max_bytes,
            current: None,
        }
    }

    /// Stage `file`, replacing any staged photo.
    ///
    /// A rejected file leaves the slot as it was.
    ///
    /// # Errors
    ///
    /// Returns an [`AttachmentRejection`] if the file is not an accepted
    /// image or is too large.
    pub fn pick(&mut self, file: PhotoFile) -> std::result::Result<(), AttachmentRejection> {
        check_photo(&file, self.max_bytes)?;

        // Release the old preview before the new one exists.
        drop(self.current.take());
        let preview = self.registry.acquire(&file);
        debug!(name = %file.name, size = file.size(), "Photo staged");
        self.current = Some(PhotoAttachment { file, preview });
        Ok(())
    }

    /// Drop the staged photo and its preview. Does nothing when empty.
    pub fn remove(&mut self) {
        if let Some(attachment) = self.current.take() {
            debug!(name = %attachment.file.name, "Photo removed");
        }
    }

    /// The staged photo, if any.
    #[must_use]
    pub fn current(&self) -> Option<&PhotoAttachment> {
        self.current.as_ref()
    }

    #[cfg(test)]
    fn registry(&self) -> &PreviewRegistry {
        &self.registry
    }
}
