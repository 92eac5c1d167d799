//! `SQLite` record storage.
//!
//! The `registrations` collection is a single table keyed by record id.
//! Calls through [`RecordStore`] run on tokio's blocking pool; the
//! synchronous methods are used directly by the CLI and by tests.

pub mod migrations;
pub mod schema;

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};
use tracing::{debug, info, warn};

use crate::backend::{NewRegistration, RecordId, RecordStore, RegistrationRecord};
use crate::error::{Error, Result};

const SELECT_COLUMNS: &str =
    "SELECT id, full_name, email, company, industry, role, message, photo_url, created_at FROM registrations";

/// Registration records in a `SQLite` database.
#[derive(Debug, Clone)]
pub struct SqliteRecordStore {
    path: PathBuf,
    conn: Arc<Mutex<Connection>>,
}

impl SqliteRecordStore {
    /// Open or create the database at `path`.
    ///
    /// Creates parent directories and initializes the schema as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        debug!("Opening database at {}", path.display());
        let conn = Connection::open(&path).map_err(|source| Error::DatabaseOpen {
            path: path.clone(),
            source,
        })?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        migrations::initialize_schema(&conn)?;

        info!("Database opened at {}", path.display());
        Ok(Self {
            path,
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Create an in-memory database.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be created.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|source| Error::DatabaseOpen {
            path: PathBuf::from(":memory:"),
            source,
        })?;
        migrations::initialize_schema(&conn)?;

        Ok(Self {
            path: PathBuf::from(":memory:"),
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Path to the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert a record under `id`, timestamped now.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RecordExists`] if `id` is taken, or a database error.
    pub fn insert(&self, id: &RecordId, fields: NewRegistration) -> Result<RegistrationRecord> {
        // Stored with microsecond precision, so the returned record
        // compares equal to what a later read yields.
        let created_at = Utc::now().trunc_subsecs(6);
        let record = RegistrationRecord::from_new(id.clone(), fields, created_at);

        let inserted = self.conn().execute(
            r"
            INSERT INTO registrations
                (id, full_name, email, company, industry, role, message, photo_url, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ",
            params![
                record.id.as_str(),
                record.full_name,
                record.email,
                record.company,
                record.industry,
                record.role,
                record.message,
                record.photo_url,
                format_timestamp(record.created_at),
            ],
        );

        match inserted {
            Ok(_) => {
                debug!(id = %record.id, "Inserted registration");
                Ok(record)
            }
            Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation => {
                Err(Error::RecordExists { id: id.to_string() })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Fetch a record by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn get_record(&self, id: &RecordId) -> Result<Option<RegistrationRecord>> {
        let record = self
            .conn()
            .query_row(
                &format!("{SELECT_COLUMNS} WHERE id = ?1"),
                [id.as_str()],
                Self::row_to_record,
            )
            .optional()?;
        Ok(record)
    }

    /// The most recent records, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn get_recent(&self, limit: usize) -> Result<Vec<RegistrationRecord>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "{SELECT_COLUMNS} ORDER BY created_at DESC, rowid DESC LIMIT ?1"
        ))?;

        let limit_i64 = i64::try_from(limit).unwrap_or(i64::MAX);
        let records = stmt
            .query_map([limit_i64], Self::row_to_record)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(records)
    }

    /// Number of stored records.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn count_records(&self) -> Result<u64> {
        let count: i64 = self
            .conn()
            .query_row("SELECT COUNT(*) FROM registrations", [], |row| row.get(0))?;
        Ok(u64::try_from(count).unwrap_or(0))
    }

    /// Database statistics.
    ///
    /// # Errors
    ///
    /// Returns an error if a query fails.
    pub fn stats(&self) -> Result<StorageStats> {
        let total_records = self.count_records()?;

        let (oldest, newest): (Option<String>, Option<String>) = self.conn().query_row(
            "SELECT MIN(created_at), MAX(created_at) FROM registrations",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        let db_size_bytes = if self.path.to_string_lossy() == ":memory:" {
            0
        } else {
            std::fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0)
        };

        Ok(StorageStats {
            total_records,
            oldest_record: oldest.as_deref().and_then(parse_timestamp),
            newest_record: newest.as_deref().and_then(parse_timestamp),
            db_size_bytes,
        })
    }

    fn row_to_record(row: &rusqlite::Row) -> rusqlite::Result<RegistrationRecord> {
        let id: String = row.get(0)?;
        let created_at_str: String = row.get(8)?;

        let created_at = parse_timestamp(&created_at_str).unwrap_or_else(|| {
            warn!(%id, value = %created_at_str, "Unreadable created_at, using epoch");
            DateTime::<Utc>::UNIX_EPOCH
        });

        Ok(RegistrationRecord {
            id: RecordId(id),
            full_name: row.get(1)?,
            email: row.get(2)?,
            company: row.get(3)?,
            industry: row.get(4)?,
            role: row.get(5)?,
            message: row.get(6)?,
            photo_url: row.get(7)?,
            created_at,
        })
    }

    async fn blocking<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Self) -> Result<T> + Send + 'static,
    {
        let store = self.clone();
        tokio::task::spawn_blocking(move || f(&store)).await?
    }
}

#[async_trait::async_trait]
impl RecordStore for SqliteRecordStore {
    async fn create(&self, id: &RecordId, fields: NewRegistration) -> Result<RegistrationRecord> {
        let id = id.clone();
        self.blocking(move |store| store.insert(&id, fields)).await
    }

    async fn get(&self, id: &RecordId) -> Result<Option<RegistrationRecord>> {
        let id = id.clone();
        self.blocking(move |store| store.get_record(&id)).await
    }

    async fn list_recent(&self, limit: usize) -> Result<Vec<RegistrationRecord>> {
        self.blocking(move |store| store.get_recent(limit)).await
    }

    async fn count(&self) -> Result<u64> {
        self.blocking(SqliteRecordStore::count_records).await
    }
}

fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Statistics about the registration database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageStats {
    /// Total number of records.
    pub total_records: u64,
    /// Timestamp of the oldest record.
    pub oldest_record: Option<DateTime<Utc>>,
    /// Timestamp of the newest record.
    pub newest_record: Option<DateTime<Utc>>,
    /// Size of the database file in bytes.
    pub db_size_bytes: u64,
}
