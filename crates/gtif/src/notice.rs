//! Transient user notices.
//!
//! The form reports outcomes through short-lived notices instead of errors.
//! A newer notice replaces the current one; an expired notice reads as none.

use std::time::Duration;

use tokio::time::Instant;

/// What kind of outcome a notice reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    /// Something succeeded.
    Success,
    /// The registrant has to correct something.
    Correction,
    /// The backend failed; the registrant can try again.
    Failure,
}

/// A message shown until it expires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    /// Text shown to the registrant.
    pub message: String,
    /// Outcome category.
    pub kind: NoticeKind,
    /// When the notice stops being shown.
    pub expires_at: Instant,
}

impl Notice {
    /// Check whether the notice is still showing at `now`.
    #[must_use]
    pub fn is_active_at(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// Holds the single current notice.
#[derive(Debug, Default)]
pub struct NoticeBoard {
    current: Option<Notice>,
}

impl NoticeBoard {
    /// Create an empty board.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Show `message` for `ttl`, replacing any current notice.
    pub fn post(&mut self, message: impl Into<String>, kind: NoticeKind, ttl: Duration) -> &Notice {
        self.current.insert(Notice {
            message: message.into(),
            kind,
            expires_at: Instant::now() + ttl,
        })
    }

    /// The notice showing now, if any.
    #[must_use]
    pub fn current(&self) -> Option<&Notice> {
        let now = Instant::now();
        self.current.as_ref().filter(|n| n.is_active_at(now))
    }

    /// Drop the current notice if it has expired.
    ///
    /// Returns `true` when a notice was dropped. A notice posted after the
    /// one whose deadline just passed is kept.
    pub fn clear_expired(&mut self) -> bool {
        let now = Instant::now();
        if self.current.as_ref().is_some_and(|n| !n.is_active_at(now)) {
            self.current = None;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_notice_expires() {
        let mut board = NoticeBoard::new();
        board.post("Please upload an image file", NoticeKind::Correction, Duration::from_millis(2_200));

        tokio::time::advance(Duration::from_millis(2_199)).await;
        assert_eq!(
            board.current().map(|n| n.message.as_str()),
            Some("Please upload an image file")
        );

        tokio::time::advance(Duration::from_millis(1)).await;
        assert!(board.current().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_newer_notice_replaces_older() {
        let mut board = NoticeBoard::new();
        board.post("first", NoticeKind::Correction, Duration::from_secs(1));
        board.post("second", NoticeKind::Success, Duration::from_secs(3));

        tokio::time::advance(Duration::from_secs(2)).await;
        let notice = board.current().unwrap();
        assert_eq!(notice.message, "second");
        assert_eq!(notice.kind, NoticeKind::Success);
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_expired_only_drops_stale_notice() {
        let mut board = NoticeBoard::new();
        assert!(!board.clear_expired());

        board.post("first", NoticeKind::Failure, Duration::from_secs(1));
        assert!(!board.clear_expired());

        tokio::time::advance(Duration::from_millis(500)).await;
        board.post("second", NoticeKind::Success, Duration::from_secs(1));
        tokio::time::advance(Duration::from_millis(500)).await;
        assert!(!board.clear_expired());
        assert_eq!(board.current().unwrap().message, "second");

        tokio::time::advance(Duration::from_millis(500)).await;
        assert!(board.clear_expired());
        assert!(!board.clear_expired());
    }
}
