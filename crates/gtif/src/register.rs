//! Persisting a registration.
//!
//! [`save_registration`] is the backend half of a submission: wait for
//! the session, upload the photo if there is one, then create the record
//! under the identifier the photo was stored with.

use tracing::{debug, info};

use crate::backend::{Backend, NewRegistration, RecordId, RegistrationRecord};
use crate::draft::RegistrationDraft;
use crate::error::Result;
use crate::photo::PhotoFile;

/// Collection the records are written to.
pub const REGISTRATIONS_COLLECTION: &str = "registrations";

/// Blob key prefix for badge photos.
pub const PHOTO_PREFIX: &str = "photos";

/// A successfully stored registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedRegistration {
    /// Identifier of the created record.
    pub id: RecordId,
    /// Public URL of the uploaded photo, empty without a photo.
    pub photo_url: String,
    /// The record as stored.
    pub record: RegistrationRecord,
}

/// Blob key of the photo belonging to record `id`.
#[must_use]
pub fn photo_key(id: &RecordId, photo: &PhotoFile) -> String {
    format!("{PHOTO_PREFIX}/{id}.{}", photo.upload_extension())
}

/// Store a validated draft and its optional photo.
///
/// The session wait is bounded; when it times out the writes are still
/// attempted and fail or succeed on their own. The upload and its URL
/// resolution finish before the record is written. A blob whose record
/// write then fails is left behind.
///
/// # Errors
///
/// Returns the first backend error. Nothing is retried.
pub async fn save_registration(
    backend: &Backend,
    draft: &RegistrationDraft,
    photo: Option<&PhotoFile>,
) -> Result<SavedRegistration> {
    let readiness = backend.session().ready().await;
    debug!(identified = readiness.is_identified(), "Session checked");

    let id = backend.records().allocate_id();

    let photo_url = match photo {
        Some(photo) => {
            let key = photo_key(&id, photo);
            let receipt = backend
                .blobs()
                .put(&key, photo.bytes.clone(), &photo.media_type)
                .await?;
            debug!(key = %receipt.key, size = receipt.size, "Photo uploaded");
            backend.blobs().public_url(&key).await?
        }
        None => String::new(),
    };

    let fields = NewRegistration::from_draft(draft, photo_url.clone());
    let record = backend.records().create(&id, fields).await?;
    info!(
        collection = REGISTRATIONS_COLLECTION,
        %id,
        with_photo = !photo_url.is_empty(),
        "Registration stored"
    );

    Ok(SavedRegistration {
        id,
        photo_url,
        record,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::backend::memory::{Journal, MemoryBlobStore, MemoryIdentity, MemoryRecordStore};
    use crate::draft::{Industry, Role};
    use crate::error::Error;
    use crate::session::{Session, SessionSettings};

    struct Fixture {
        backend: Backend,
        records: Arc<MemoryRecordStore>,
        blobs: Arc<MemoryBlobStore>,
        journal: Journal,
    }

    fn fixture(identity: MemoryIdentity) -> Fixture {
        let journal = Journal::new();
        let records = Arc::new(MemoryRecordStore::with_journal(journal.clone()));
        let blobs = Arc::new(MemoryBlobStore::with_journal(journal.clone()));
        let session = Session::start(Arc::new(identity), SessionSettings::default());
        Fixture {
            backend: Backend::new(session, records.clone(), blobs.clone()),
            records,
            blobs,
            journal,
        }
    }

    fn draft() -> RegistrationDraft {
        RegistrationDraft {
            full_name: "Kwame Mensah".to_string(),
            email: "kwame@example.com".to_string(),
            company: "Accra Exports".to_string(),
            industry: Some(Industry::Manufacturing),
            role: Some(Role::Exhibitor),
            message: "Booth near the entrance please".to_string(),
        }
    }

    #[test]
    fn test_photo_key() {
        let id = RecordId("r1".to_string());
        assert_eq!(
            photo_key(&id, &PhotoFile::new("Me.PNG", "image/png", vec![1])),
            "photos/r1.png"
        );
        assert_eq!(
            photo_key(&id, &PhotoFile::new("portrait", "image/jpeg", vec![1])),
            "photos/r1.jpg"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_without_photo() {
        let f = fixture(MemoryIdentity::new());

        let saved = save_registration(&f.backend, &draft(), None).await.unwrap();

        assert_eq!(saved.photo_url, "");
        assert_eq!(saved.record.photo_url, "");
        assert_eq!(saved.record.industry, "Manufacturing");
        assert_eq!(saved.record.role, "Exhibitor");
        assert!(f.blobs.keys().is_empty());
        assert_eq!(f.records.records(), vec![saved.record]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_upload_precedes_record_write() {
        let f = fixture(MemoryIdentity::new());
        let photo = PhotoFile::new("badge.webp", "image/webp", vec![7; 64]);

        let saved = save_registration(&f.backend, &draft(), Some(&photo))
            .await
            .unwrap();

        let key = format!("photos/{}.webp", saved.id);
        assert_eq!(
            f.journal.entries(),
            [
                format!("upload {key}"),
                format!("url {key}"),
                format!("create {}", saved.id),
            ]
        );
        assert_eq!(saved.photo_url, format!("https://blobs.test/{key}"));
        assert_eq!(saved.record.photo_url, saved.photo_url);
        assert_eq!(f.blobs.get(&key).unwrap().content_type, "image/webp");
    }

    #[tokio::test(start_paused = true)]
    async fn test_upload_failure_skips_record() {
        let f = fixture(MemoryIdentity::new());
        f.blobs.set_fail_uploads(true);
        let photo = PhotoFile::new("a.png", "image/png", vec![1]);

        let err = save_registration(&f.backend, &draft(), Some(&photo))
            .await
            .unwrap_err();

        assert!(err.is_backend_error());
        assert_eq!(f.records.write_attempts(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_write_failure_leaves_blob() {
        let f = fixture(MemoryIdentity::new());
        f.records.set_fail_writes(true);
        let photo = PhotoFile::new("a.gif", "image/gif", vec![1]);

        let err = save_registration(&f.backend, &draft(), Some(&photo))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Unavailable(_)));
        assert_eq!(f.blobs.keys().len(), 1);
        assert!(f.records.records().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_proceeds_after_session_timeout() {
        let f = fixture(MemoryIdentity::unreachable());

        let started = tokio::time::Instant::now();
        let saved = save_registration(&f.backend, &draft(), None).await.unwrap();

        assert!(started.elapsed() >= Duration::from_secs(4));
        assert_eq!(f.records.records().len(), 1);
        assert_eq!(f.records.records()[0].id, saved.id);
    }
}
