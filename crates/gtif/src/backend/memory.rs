//! In-process backend services.
//!
//! These keep everything in memory and can be told to fail, which makes
//! them the backend of choice for tests. A shared [`Journal`] records the
//! order in which operations reached the services.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use tokio::sync::watch;

use super::{
    BlobReceipt, BlobStore, IdentityService, NewRegistration, RecordId, RecordStore,
    RegistrationRecord, Uid,
};
use crate::error::{Error, Result};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Ordered log of backend operations, shared between services.
#[derive(Debug, Clone, Default)]
pub struct Journal {
    entries: Arc<Mutex<Vec<String>>>,
}

impl Journal {
    /// Create an empty journal.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, entry: String) {
        lock(&self.entries).push(entry);
    }

    /// Every operation so far, oldest first.
    #[must_use]
    pub fn entries(&self) -> Vec<String> {
        lock(&self.entries).clone()
    }
}

/// How [`MemoryIdentity`] answers sign-in requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SignIn {
    Succeed,
    FailFirst(usize),
    AlwaysFail,
}

/// Scriptable anonymous identity service.
#[derive(Debug)]
pub struct MemoryIdentity {
    state: watch::Sender<Option<Uid>>,
    mode: SignIn,
    attempts: AtomicUsize,
}

impl MemoryIdentity {
    /// Signs in on the first attempt.
    #[must_use]
    pub fn new() -> Self {
        Self::with_mode(SignIn::Succeed)
    }

    /// Fails the first `n` attempts, then signs in.
    #[must_use]
    pub fn failing(n: usize) -> Self {
        Self::with_mode(SignIn::FailFirst(n))
    }

    /// Never signs in.
    #[must_use]
    pub fn unreachable() -> Self {
        Self::with_mode(SignIn::AlwaysFail)
    }

    fn with_mode(mode: SignIn) -> Self {
        let (state, _) = watch::channel(None);
        Self {
            state,
            mode,
            attempts: AtomicUsize::new(0),
        }
    }

    /// Number of sign-in attempts so far.
    #[must_use]
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    /// The published identity.
    #[must_use]
    pub fn current(&self) -> Option<Uid> {
        self.state.borrow().clone()
    }

    /// Drop the identity, as if the session expired.
    pub fn sign_out(&self) {
        self.state.send_replace(None);
    }
}

impl Default for MemoryIdentity {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl IdentityService for MemoryIdentity {
    async fn sign_in_anonymously(&self) -> Result<Uid> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        let succeed = match self.mode {
            SignIn::Succeed => true,
            SignIn::FailFirst(n) => attempt > n,
            SignIn::AlwaysFail => false,
        };
        if !succeed {
            return Err(Error::identity(format!(
                "anonymous sign-in refused (attempt {attempt})"
            )));
        }
        let uid = Uid(format!("anon-{attempt}"));
        self.state.send_replace(Some(uid.clone()));
        Ok(uid)
    }

    fn subscribe(&self) -> watch::Receiver<Option<Uid>> {
        self.state.subscribe()
    }
}

/// Record store kept in a vector.
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    records: Mutex<Vec<RegistrationRecord>>,
    fail_writes: AtomicBool,
    writes: AtomicUsize,
    journal: Journal,
}

impl MemoryRecordStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty store logging into `journal`.
    #[must_use]
    pub fn with_journal(journal: Journal) -> Self {
        Self {
            journal,
            ..Self::default()
        }
    }

    /// Make every following write fail (or succeed again).
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of write attempts, failed ones included.
    #[must_use]
    pub fn write_attempts(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Snapshot of the stored records, oldest first.
    #[must_use]
    pub fn records(&self) -> Vec<RegistrationRecord> {
        lock(&self.records).clone()
    }
}

#[async_trait::async_trait]
impl RecordStore for MemoryRecordStore {
    async fn create(&self, id: &RecordId, fields: NewRegistration) -> Result<RegistrationRecord> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.journal.record(format!("create {id}"));
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Error::unavailable("document database rejected the write"));
        }

        let mut records = lock(&self.records);
        if records.iter().any(|r| &r.id == id) {
            return Err(Error::RecordExists { id: id.to_string() });
        }
        let record = RegistrationRecord::from_new(id.clone(), fields, Utc::now());
        records.push(record.clone());
        Ok(record)
    }

    async fn get(&self, id: &RecordId) -> Result<Option<RegistrationRecord>> {
        Ok(lock(&self.records).iter().find(|r| &r.id == id).cloned())
    }

    async fn list_recent(&self, limit: usize) -> Result<Vec<RegistrationRecord>> {
        Ok(lock(&self.records).iter().rev().take(limit).cloned().collect())
    }

    async fn count(&self) -> Result<u64> {
        Ok(lock(&self.records).len() as u64)
    }
}

/// A stored object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredBlob {
    /// Object contents.
    pub bytes: Arc<[u8]>,
    /// Declared media type.
    pub content_type: String,
}

/// Blob store kept in a map.
#[derive(Debug)]
pub struct MemoryBlobStore {
    blobs: Mutex<BTreeMap<String, StoredBlob>>,
    base_url: String,
    fail_uploads: AtomicBool,
    uploads: AtomicUsize,
    journal: Journal,
}

impl Default for MemoryBlobStore {
    fn default() -> Self {
        Self {
            blobs: Mutex::default(),
            base_url: "https://blobs.test".to_string(),
            fail_uploads: AtomicBool::new(false),
            uploads: AtomicUsize::new(0),
            journal: Journal::default(),
        }
    }
}

impl MemoryBlobStore {
    /// Create an empty store serving URLs under `https://blobs.test`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty store logging into `journal`.
    #[must_use]
    pub fn with_journal(journal: Journal) -> Self {
        Self {
            journal,
            ..Self::default()
        }
    }

    /// Make every following upload fail (or succeed again).
    pub fn set_fail_uploads(&self, fail: bool) {
        self.fail_uploads.store(fail, Ordering::SeqCst);
    }

    /// Number of upload attempts, failed ones included.
    #[must_use]
    pub fn upload_attempts(&self) -> usize {
        self.uploads.load(Ordering::SeqCst)
    }

    /// Fetch a stored object.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<StoredBlob> {
        lock(&self.blobs).get(key).cloned()
    }

    /// Every stored key.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        lock(&self.blobs).keys().cloned().collect()
    }
}

#[async_trait::async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(&self, key: &str, bytes: Arc<[u8]>, content_type: &str) -> Result<BlobReceipt> {
        self.uploads.fetch_add(1, Ordering::SeqCst);
        self.journal.record(format!("upload {key}"));
        if self.fail_uploads.load(Ordering::SeqCst) {
            return Err(Error::unavailable("blob storage rejected the upload"));
        }

        let mut blobs = lock(&self.blobs);
        if blobs.contains_key(key) {
            return Err(Error::BlobExists {
                key: key.to_string(),
            });
        }
        let receipt = BlobReceipt::for_bytes(key, &bytes);
        blobs.insert(
            key.to_string(),
            StoredBlob {
                bytes,
                content_type: content_type.to_string(),
            },
        );
        Ok(receipt)
    }

    async fn public_url(&self, key: &str) -> Result<String> {
        self.journal.record(format!("url {key}"));
        if !lock(&self.blobs).contains_key(key) {
            return Err(Error::BlobNotFound {
                key: key.to_string(),
            });
        }
        Ok(format!("{}/{key}", self.base_url))
    }
}
