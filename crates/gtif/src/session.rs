//! Anonymous session bootstrap.
//!
//! Writes to the backend require an identity. [`Session::start`] begins
//! anonymous sign-in at once and keeps retrying in the background while
//! the identity service reports no identity. [`Session::ready`] waits for
//! an identity but never longer than the configured timeout: after that
//! the caller proceeds and lets the write itself succeed or fail.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::backend::{IdentityService, Uid};
use crate::config::Config;

/// Timing of the bootstrap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSettings {
    /// Longest time [`Session::ready`] waits.
    pub ready_timeout: Duration,
    /// Pause between failed sign-in attempts.
    pub retry_interval: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            ready_timeout: Duration::from_secs(4),
            retry_interval: Duration::from_secs(1),
        }
    }
}

impl SessionSettings {
    /// Read the timings from the configuration.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            ready_timeout: config.ready_timeout(),
            retry_interval: config.sign_in_retry(),
        }
    }
}

/// How a wait for the session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Readiness {
    /// An identity is established.
    Identified(Uid),
    /// No identity appeared before the timeout.
    TimedOut,
}

impl Readiness {
    /// Check whether an identity was established.
    #[must_use]
    pub fn is_identified(&self) -> bool {
        matches!(self, Self::Identified(_))
    }
}

/// A running anonymous session.
///
/// Dropping the session stops the background sign-in task.
#[derive(Debug)]
pub struct Session {
    state: watch::Receiver<Option<Uid>>,
    settings: SessionSettings,
    bootstrap: JoinHandle<()>,
}

impl Session {
    /// Start signing in through `identity`.
    ///
    /// Must be called from within a tokio runtime.
    #[must_use]
    pub fn start(identity: Arc<dyn IdentityService>, settings: SessionSettings) -> Self {
        let state = identity.subscribe();
        let bootstrap = tokio::spawn(keep_signed_in(
            identity,
            state.clone(),
            settings.retry_interval,
        ));
        Self {
            state,
            settings,
            bootstrap,
        }
    }

    /// Wait until an identity is established or the timeout elapses.
    ///
    /// Each caller waits on its own receiver, so concurrent callers are
    /// all released by the same identity event and each wait is bounded.
    pub async fn ready(&self) -> Readiness {
        let mut state = self.state.clone();
        let wait = async {
            state
                .wait_for(Option::is_some)
                .await
                .ok()
                .and_then(|uid| (*uid).clone())
        };

        match tokio::time::timeout(self.settings.ready_timeout, wait).await {
            Ok(Some(uid)) => Readiness::Identified(uid),
            Ok(None) => {
                warn!("Identity service went away before a session was established");
                Readiness::TimedOut
            }
            Err(_) => {
                warn!(
                    timeout_ms = self.settings.ready_timeout.as_millis(),
                    "No anonymous session yet, continuing without one"
                );
                Readiness::TimedOut
            }
        }
    }

    /// The identity right now, if any.
    #[must_use]
    pub fn current(&self) -> Option<Uid> {
        self.state.borrow().clone()
    }

    /// The session timings.
    #[must_use]
    pub fn settings(&self) -> SessionSettings {
        self.settings
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.bootstrap.abort();
    }
}

/// Sign in now, and again whenever the identity is missing.
async fn keep_signed_in(
    identity: Arc<dyn IdentityService>,
    mut state: watch::Receiver<Option<Uid>>,
    retry_interval: Duration,
) {
    loop {
        let signed_in = state.borrow_and_update().is_some();
        if signed_in {
            // Wait for the identity to change, e.g. be lost.
            if state.changed().await.is_err() {
                return;
            }
            continue;
        }

        match identity.sign_in_anonymously().await {
            Ok(uid) => info!(%uid, "Anonymous session established"),
            Err(e) => warn!(error = %e, "Anonymous sign-in failed"),
        }

        if state.borrow_and_update().is_some() {
            continue;
        }
        debug!(
            retry_ms = retry_interval.as_millis(),
            "No identity yet, retrying sign-in"
        );
        tokio::select! {
            changed = state.changed() => {
                if changed.is_err() {
                    return;
                }
            }
            () = tokio::time::sleep(retry_interval) => {}
        }
    }
}
