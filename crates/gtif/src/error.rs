//! Error types for gtif.
//!
//! Backend and infrastructure failures are collected in [`Error`]. The
//! user-correctable outcomes of the form (validation and attachment
//! rejection) have their own small enums next to the code that raises them.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for gtif operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Storage Errors ===
    /// Failed to open or create the database.
    #[error("failed to open database at {path}: {source}")]
    DatabaseOpen {
        /// Path to the database file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: rusqlite::Error,
    },

    /// A database query failed.
    #[error("database query failed: {0}")]
    DatabaseQuery(#[from] rusqlite::Error),

    /// Failed to run database migrations.
    #[error("database migration failed: {message}")]
    DatabaseMigration {
        /// Description of what went wrong.
        message: String,
    },

    // === Configuration Errors ===
    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    // === Backend Errors ===
    /// A blob already exists under the requested key.
    #[error("blob already exists: {key}")]
    BlobExists {
        /// The storage key that was already taken.
        key: String,
    },

    /// A blob key was rejected by the store.
    #[error("invalid blob key '{key}': {message}")]
    BlobKey {
        /// The offending key.
        key: String,
        /// Why it was rejected.
        message: String,
    },

    /// A blob was requested that does not exist.
    #[error("blob not found: {key}")]
    BlobNotFound {
        /// The missing key.
        key: String,
    },

    /// A record with the same identifier already exists.
    #[error("record already exists: {id}")]
    RecordExists {
        /// The duplicate identifier.
        id: String,
    },

    /// The identity service could not establish a session.
    #[error("identity error: {0}")]
    Identity(String),

    /// A backend service is unreachable or refused the request.
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    // === I/O Errors ===
    /// File system operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to create a required directory.
    #[error("failed to create directory {path}: {source}")]
    DirectoryCreate {
        /// Path that couldn't be created.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    // === Serialization Errors ===
    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // === Generic Errors ===
    /// An internal error occurred (bug).
    #[error("internal error: {0}")]
    Internal(String),
}

/// A specialized Result type for gtif operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl From<tokio::task::JoinError> for Error {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Internal(format!("background task failed: {err}"))
    }
}

impl Error {
    /// Create a new identity error.
    #[must_use]
    pub fn identity(message: impl Into<String>) -> Self {
        Self::Identity(message.into())
    }

    /// Create a new unavailable-backend error.
    #[must_use]
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable(message.into())
    }

    /// Create a new internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Create an invalid blob key error.
    #[must_use]
    pub fn blob_key(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::BlobKey {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Check if this error came from a backend service rather than local setup.
    #[must_use]
    pub fn is_backend_error(&self) -> bool {
        matches!(
            self,
            Self::BlobExists { .. }
                | Self::BlobKey { .. }
                | Self::BlobNotFound { .. }
                | Self::RecordExists { .. }
                | Self::Identity(_)
                | Self::Unavailable(_)
                | Self::DatabaseQuery(_)
        )
    }
}
