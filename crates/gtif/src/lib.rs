//! `gtif` - Registration client for the Ghana Trade & Investment Forum 2025
//!
//! This library provides the registration pipeline (draft caching, photo
//! staging, validation, anonymous session bootstrap and submission), the
//! backend capabilities it writes to with local and in-memory
//! implementations, and the event countdown and calendar export.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod backend;
pub mod calendar;
pub mod cli;
pub mod config;
pub mod draft;
pub mod error;
pub mod event;
pub mod form;
pub mod local_store;
pub mod logging;
pub mod notice;
pub mod photo;
pub mod register;
pub mod session;
pub mod storage;
pub mod validate;

pub use backend::Backend;
pub use config::Config;
pub use draft::{DraftEdit, Industry, RegistrationDraft, Role};
pub use error::{Error, Result};
pub use form::{RegistrationForm, SubmitOutcome};
pub use logging::init_logging;
pub use storage::{SqliteRecordStore, StorageStats};
