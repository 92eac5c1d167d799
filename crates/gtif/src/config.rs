//! Configuration management for gtif.
//!
//! This module provides configuration loading and validation using figment,
//! supporting TOML config files, environment variables, and defaults.

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default data directory name.
const DATA_DIR_NAME: &str = "gtif";

/// Default database file name.
const DATABASE_FILE_NAME: &str = "registrations.db";

/// Default blob directory name.
const BLOB_DIR_NAME: &str = "blobs";

/// Default local key-value store file name.
const LOCAL_STORE_FILE_NAME: &str = "local-storage.json";

/// Default identity file name.
const IDENTITY_FILE_NAME: &str = "identity";

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (prefixed with `GTIF_`)
/// 2. TOML config file at `~/.config/gtif/config.toml`
/// 3. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Where local state and the bundled backend keep their files.
    pub storage: StorageConfig,
    /// Backend connection settings.
    pub backend: BackendConfig,
    /// Registration form behaviour.
    pub form: FormConfig,
}

/// Storage-related configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Root directory for everything below.
    /// Defaults to `~/.local/share/gtif`
    pub data_dir: Option<PathBuf>,
    /// Path to the registrations database.
    pub database_path: Option<PathBuf>,
    /// Directory holding uploaded blobs.
    pub blob_dir: Option<PathBuf>,
    /// Path to the local key-value store file (draft cache).
    pub local_store_path: Option<PathBuf>,
}

/// Backend-related configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Base URL under which uploaded blobs are publicly served.
    /// When unset, blob URLs point at the local files.
    pub public_base_url: Option<String>,
    /// Upper bound on waiting for an anonymous session, in milliseconds.
    pub ready_timeout_ms: u64,
    /// Delay between anonymous sign-in attempts, in milliseconds.
    pub sign_in_retry_ms: u64,
}

/// Form-related configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormConfig {
    /// Key of the draft entry in the local store.
    pub draft_key: String,
    /// Largest accepted photo, in bytes.
    pub max_photo_bytes: u64,
    /// Lifetime of submit notices, in milliseconds.
    pub notice_ms: u64,
    /// Lifetime of photo rejection notices, in milliseconds.
    pub rejection_notice_ms: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            public_base_url: None,
            ready_timeout_ms: 4_000,
            sign_in_retry_ms: 1_000,
        }
    }
}

impl Default for FormConfig {
    fn default() -> Self {
        Self {
            draft_key: "gtif_form".to_string(),
            max_photo_bytes: 5 * 1024 * 1024,
            notice_ms: 2_500,
            rejection_notice_ms: 2_200,
        }
    }
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration with an optional custom config path.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);

        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_file))
            .merge(Env::prefixed("GTIF_").split("__"));

        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(DATA_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Get the default data directory path.
    #[must_use]
    pub fn default_data_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from(".local/share"))
            .join(DATA_DIR_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        if self.backend.ready_timeout_ms == 0 {
            return Err(Error::ConfigValidation {
                message: "ready_timeout_ms must be greater than 0".to_string(),
            });
        }

        if self.backend.sign_in_retry_ms == 0 {
            return Err(Error::ConfigValidation {
                message: "sign_in_retry_ms must be greater than 0".to_string(),
            });
        }

        if let Some(url) = &self.backend.public_base_url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(Error::ConfigValidation {
                    message: format!("public_base_url must be an http(s) URL: {url}"),
                });
            }
        }

        if self.form.draft_key.trim().is_empty() {
            return Err(Error::ConfigValidation {
                message: "draft_key must not be empty".to_string(),
            });
        }

        if self.form.max_photo_bytes == 0 {
            return Err(Error::ConfigValidation {
                message: "max_photo_bytes must be greater than 0".to_string(),
            });
        }

        if self.form.notice_ms == 0 || self.form.rejection_notice_ms == 0 {
            return Err(Error::ConfigValidation {
                message: "notice durations must be greater than 0".to_string(),
            });
        }

        Ok(())
    }

    /// Get the data directory, resolving defaults if not set.
    #[must_use]
    pub fn data_dir(&self) -> PathBuf {
        self.storage
            .data_dir
            .clone()
            .unwrap_or_else(Self::default_data_dir)
    }

    /// Get the database path, resolving defaults if not set.
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.storage
            .database_path
            .clone()
            .unwrap_or_else(|| self.data_dir().join(DATABASE_FILE_NAME))
    }

    /// Get the blob directory, resolving defaults if not set.
    #[must_use]
    pub fn blob_dir(&self) -> PathBuf {
        self.storage
            .blob_dir
            .clone()
            .unwrap_or_else(|| self.data_dir().join(BLOB_DIR_NAME))
    }

    /// Get the local store path, resolving defaults if not set.
    #[must_use]
    pub fn local_store_path(&self) -> PathBuf {
        self.storage
            .local_store_path
            .clone()
            .unwrap_or_else(|| self.data_dir().join(LOCAL_STORE_FILE_NAME))
    }

    /// Path of the persisted anonymous identity.
    #[must_use]
    pub fn identity_path(&self) -> PathBuf {
        self.data_dir().join(IDENTITY_FILE_NAME)
    }

    /// Get the session readiness timeout as a Duration.
    #[must_use]
    pub fn ready_timeout(&self) -> Duration {
        Duration::from_millis(self.backend.ready_timeout_ms)
    }

    /// Get the sign-in retry interval as a Duration.
    #[must_use]
    pub fn sign_in_retry(&self) -> Duration {
        Duration::from_millis(self.backend.sign_in_retry_ms)
    }

    /// Get the submit notice lifetime as a Duration.
    #[must_use]
    pub fn notice_ttl(&self) -> Duration {
        Duration::from_millis(self.form.notice_ms)
    }

    /// Get the rejection notice lifetime as a Duration.
    #[must_use]
    pub fn rejection_notice_ttl(&self) -> Duration {
        Duration::from_millis(self.form.rejection_notice_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_backend_config() {
        let backend = BackendConfig::default();

        assert!(backend.public_base_url.is_none());
        assert_eq!(backend.ready_timeout_ms, 4_000);
        assert_eq!(backend.sign_in_retry_ms, 1_000);
    }

    #[test]
    fn test_default_form_config() {
        let form = FormConfig::default();

        assert_eq!(form.draft_key, "gtif_form");
        assert_eq!(form.max_photo_bytes, 5 * 1024 * 1024);
        assert_eq!(form.notice_ms, 2_500);
        assert_eq!(form.rejection_notice_ms, 2_200);
    }

    #[test]
    fn test_validate_valid_config() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_validate_zero_ready_timeout() {
        let mut config = Config::default();
        config.backend.ready_timeout_ms = 0;

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("ready_timeout_ms"));
    }

    #[test]
    fn test_validate_zero_retry() {
        let mut config = Config::default();
        config.backend.sign_in_retry_ms = 0;

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("sign_in_retry_ms"));
    }

    #[test]
    fn test_validate_bad_base_url() {
        let mut config = Config::default();
        config.backend.public_base_url = Some("ftp://example.com".to_string());

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("public_base_url"));

        config.backend.public_base_url = Some("https://cdn.example.com/gtif".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_empty_draft_key() {
        let mut config = Config::default();
        config.form.draft_key = "  ".to_string();

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("draft_key"));
    }

    #[test]
    fn test_validate_zero_photo_limit() {
        let mut config = Config::default();
        config.form.max_photo_bytes = 0;

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("max_photo_bytes"));
    }

    #[test]
    fn test_validate_zero_notice() {
        let mut config = Config::default();
        config.form.rejection_notice_ms = 0;

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_paths_follow_data_dir() {
        let mut config = Config::default();
        config.storage.data_dir = Some(PathBuf::from("/srv/gtif"));

        assert_eq!(
            config.database_path(),
            PathBuf::from("/srv/gtif/registrations.db")
        );
        assert_eq!(config.blob_dir(), PathBuf::from("/srv/gtif/blobs"));
        assert_eq!(
            config.local_store_path(),
            PathBuf::from("/srv/gtif/local-storage.json")
        );
        assert_eq!(config.identity_path(), PathBuf::from("/srv/gtif/identity"));
    }

    #[test]
    fn test_explicit_paths_win() {
        let mut config = Config::default();
        config.storage.data_dir = Some(PathBuf::from("/srv/gtif"));
        config.storage.database_path = Some(PathBuf::from("/var/db/reg.sqlite"));

        assert_eq!(config.database_path(), PathBuf::from("/var/db/reg.sqlite"));
    }

    #[test]
    fn test_default_paths() {
        assert!(Config::default_config_path()
            .to_string_lossy()
            .contains("config.toml"));
        assert!(Config::default_data_dir().to_string_lossy().contains("gtif"));
        assert!(Config::default()
            .database_path()
            .to_string_lossy()
            .contains("registrations.db"));
    }

    #[test]
    fn test_durations() {
        let config = Config::default();

        assert_eq!(config.ready_timeout(), Duration::from_secs(4));
        assert_eq!(config.sign_in_retry(), Duration::from_secs(1));
        assert_eq!(config.notice_ttl(), Duration::from_millis(2_500));
        assert_eq!(config.rejection_notice_ttl(), Duration::from_millis(2_200));
    }

    #[test]
    fn test_load_nonexistent_config() {
        let config = Config::load_from(Some(PathBuf::from("/nonexistent/config.toml"))).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_from_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[backend]\nready_timeout_ms = 250\n\n[form]\ndraft_key = \"other\"\n",
        )
        .unwrap();

        let config = Config::load_from(Some(path)).unwrap();
        assert_eq!(config.backend.ready_timeout_ms, 250);
        assert_eq!(config.form.draft_key, "other");
        assert_eq!(config.form.notice_ms, 2_500);
    }

    #[test]
    fn test_load_rejects_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[form]\nmax_photo_bytes = 0\n").unwrap();

        assert!(Config::load_from(Some(path)).is_err());
    }

    #[test]
    fn test_file_sections_merge_over_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[storage]\ndata_dir = \"/srv/gtif\"\n\n[backend]\npublic_base_url = \"https://cdn.example.com/gtif\"\n",
        )
        .unwrap();

        let config = Config::load_from(Some(path)).unwrap();
        assert_eq!(config.data_dir(), PathBuf::from("/srv/gtif"));
        assert_eq!(
            config.backend.public_base_url.as_deref(),
            Some("https://cdn.example.com/gtif")
        );
        assert_eq!(config.backend.ready_timeout_ms, 4_000);
        assert_eq!(config.form, FormConfig::default());
    }

    #[test]
    fn test_form_config_deserialize() {
        let json = r#"{"max_photo_bytes": 1024}"#;
        let form: FormConfig = serde_json::from_str(json).unwrap();
        assert_eq!(form.max_photo_bytes, 1024);
        assert_eq!(form.draft_key, "gtif_form");
    }
}
