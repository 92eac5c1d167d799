//! Logging configuration for gtif.
//!
//! Installs the tracing subscriber used by the binary. Library code only
//! emits events through the `tracing` macros.

use tracing::Level;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Verbosity level for logging output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    /// Suppress all output except errors.
    Quiet,
    /// Warnings and errors. Keeps the interactive output readable.
    #[default]
    Normal,
    /// Lifecycle output (info and above).
    Verbose,
    /// Debug output.
    Debug,
    /// Very verbose output (trace level).
    Trace,
}

impl Verbosity {
    /// Build a verbosity from the CLI flags.
    #[must_use]
    pub fn from_flags(quiet: bool, verbose: u8) -> Self {
        if quiet {
            return Self::Quiet;
        }
        match verbose {
            0 => Self::Normal,
            1 => Self::Verbose,
            2 => Self::Debug,
            _ => Self::Trace,
        }
    }

    /// Convert verbosity to tracing level filter.
    #[must_use]
    pub fn to_level_filter(&self) -> Level {
        match self {
            Self::Quiet => Level::ERROR,
            Self::Normal => Level::WARN,
            Self::Verbose => Level::INFO,
            Self::Debug => Level::DEBUG,
            Self::Trace => Level::TRACE,
        }
    }
}

/// Initialize the logging system.
///
/// Call once at startup. `RUST_LOG` takes precedence over `verbosity`.
/// Output goes to stderr so command output on stdout stays clean.
///
/// # Examples
///
/// ```no_run
/// use gtif::{init_logging, logging::Verbosity};
///
/// init_logging(Verbosity::Verbose);
/// ```
pub fn init_logging(verbosity: Verbosity) {
    let default_filter = format!("gtif={}", verbosity.to_level_filter());

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&default_filter));

    let subscriber = tracing_subscriber::registry().with(env_filter).with(
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false),
    );

    // A subscriber may already be installed (tests, embedding); keep it.
    let _ = subscriber.try_init();
}

/// Initialize logging for tests.
#[cfg(test)]
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("warn")
        .with_test_writer()
        .try_init();
}
