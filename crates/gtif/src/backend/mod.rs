//! Backend capabilities used by the registration pipeline.
//!
//! The pipeline needs three services: an anonymous identity, a document
//! database holding registration records, and blob storage for badge
//! photos. Each sits behind a narrow trait so the hosted services, the
//! bundled local implementations and the in-memory test doubles are
//! interchangeable. [`Backend`] bundles one of each with the session that
//! gates writes.

pub mod blobs;
pub mod identity;
pub mod memory;

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::config::Config;
use crate::draft::RegistrationDraft;
use crate::error::Result;
use crate::session::{Session, SessionSettings};
use crate::storage::SqliteRecordStore;

pub use blobs::FsBlobStore;
pub use identity::LocalIdentity;

/// Identifier of an anonymous user.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Uid(pub String);

impl fmt::Display for Uid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of a registration record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub String);

impl RecordId {
    /// Generate a fresh random identifier.
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }

    /// The identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Fields written for a new registration. The store adds id and timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewRegistration {
    /// Registrant's full name.
    pub full_name: String,
    /// Contact email.
    pub email: String,
    /// Company, may be empty.
    pub company: String,
    /// Industry label.
    pub industry: String,
    /// Role label.
    pub role: String,
    /// Message, may be empty.
    pub message: String,
    /// Public URL of the badge photo, empty when none was uploaded.
    pub photo_url: String,
}

impl NewRegistration {
    /// Build the record fields from a draft and the resolved photo URL.
    #[must_use]
    pub fn from_draft(draft: &RegistrationDraft, photo_url: impl Into<String>) -> Self {
        Self {
            full_name: draft.full_name.clone(),
            email: draft.email.clone(),
            company: draft.company.clone(),
            industry: draft
                .industry
                .map(|i| i.label().to_string())
                .unwrap_or_default(),
            role: draft.role.map(|r| r.label().to_string()).unwrap_or_default(),
            message: draft.message.clone(),
            photo_url: photo_url.into(),
        }
    }
}

/// A stored registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationRecord {
    /// Record identifier.
    pub id: RecordId,
    /// Registrant's full name.
    pub full_name: String,
    /// Contact email.
    pub email: String,
    /// Company, may be empty.
    pub company: String,
    /// Industry label.
    pub industry: String,
    /// Role label.
    pub role: String,
    /// Message, may be empty.
    pub message: String,
    /// Public URL of the badge photo, empty when none was uploaded.
    pub photo_url: String,
    /// Timestamp assigned by the store.
    pub created_at: DateTime<Utc>,
}

impl RegistrationRecord {
    /// Attach store-assigned id and timestamp to new registration fields.
    #[must_use]
    pub fn from_new(id: RecordId, fields: NewRegistration, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            full_name: fields.full_name,
            email: fields.email,
            company: fields.company,
            industry: fields.industry,
            role: fields.role,
            message: fields.message,
            photo_url: fields.photo_url,
            created_at,
        }
    }
}

/// What blob storage reports after a successful upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobReceipt {
    /// Storage key.
    pub key: String,
    /// Stored size in bytes.
    pub size: u64,
    /// BLAKE3 hash of the stored bytes, hex encoded.
    pub content_hash: String,
}

impl BlobReceipt {
    /// Build a receipt for `bytes` stored under `key`.
    #[must_use]
    pub fn for_bytes(key: impl Into<String>, bytes: &[u8]) -> Self {
        Self {
            key: key.into(),
            size: bytes.len() as u64,
            content_hash: blake3::hash(bytes).to_hex().to_string(),
        }
    }
}

/// Anonymous identity provider.
#[async_trait::async_trait]
pub trait IdentityService: Send + Sync + fmt::Debug {
    /// Sign in without credentials. On success the new identity is also
    /// published to subscribers.
    ///
    /// # Errors
    ///
    /// Returns an error if no identity could be established.
    async fn sign_in_anonymously(&self) -> Result<Uid>;

    /// Observe the current identity, `None` while signed out.
    fn subscribe(&self) -> watch::Receiver<Option<Uid>>;
}

/// Document database holding registration records.
#[async_trait::async_trait]
pub trait RecordStore: Send + Sync + fmt::Debug {
    /// Reserve an identifier for a record about to be created.
    fn allocate_id(&self) -> RecordId {
        RecordId::generate()
    }

    /// Create a record under `id`, stamping it with the store's clock.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails or `id` is taken.
    async fn create(&self, id: &RecordId, fields: NewRegistration) -> Result<RegistrationRecord>;

    /// Fetch one record.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails.
    async fn get(&self, id: &RecordId) -> Result<Option<RegistrationRecord>>;

    /// Most recent records first.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails.
    async fn list_recent(&self, limit: usize) -> Result<Vec<RegistrationRecord>>;

    /// Number of stored records.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails.
    async fn count(&self) -> Result<u64>;
}

/// Write-once object storage.
#[async_trait::async_trait]
pub trait BlobStore: Send + Sync + fmt::Debug {
    /// Store `bytes` under `key`. Keys cannot be overwritten.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is invalid or taken, or the write fails.
    async fn put(&self, key: &str, bytes: Arc<[u8]>, content_type: &str) -> Result<BlobReceipt>;

    /// A URL from which the stored object can be fetched.
    ///
    /// # Errors
    ///
    /// Returns an error if the object does not exist.
    async fn public_url(&self, key: &str) -> Result<String>;
}

/// Handle to the backend services, created once per process.
#[derive(Debug)]
pub struct Backend {
    session: Session,
    records: Arc<dyn RecordStore>,
    blobs: Arc<dyn BlobStore>,
}

impl Backend {
    /// Bundle a running session with record and blob stores.
    #[must_use]
    pub fn new(session: Session, records: Arc<dyn RecordStore>, blobs: Arc<dyn BlobStore>) -> Self {
        Self {
            session,
            records,
            blobs,
        }
    }

    /// Open the bundled local backend described by `config` and start
    /// anonymous sign-in.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns an error if the record database cannot be opened.
    pub fn open(config: &Config) -> Result<Self> {
        let records = SqliteRecordStore::open(config.database_path())?;
        let blobs = FsBlobStore::new(config.blob_dir(), config.backend.public_base_url.clone());
        let identity = LocalIdentity::new(config.identity_path());
        let session = Session::start(Arc::new(identity), SessionSettings::from_config(config));
        Ok(Self::new(session, Arc::new(records), Arc::new(blobs)))
    }

    /// The anonymous session gating writes.
    #[must_use]
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// The record store.
    #[must_use]
    pub fn records(&self) -> &Arc<dyn RecordStore> {
        &self.records
    }

    /// The blob store.
    #[must_use]
    pub fn blobs(&self) -> &Arc<dyn BlobStore> {
        &self.blobs
    }
}
