//! The registration form.
//!
//! [`RegistrationForm`] ties the draft, its local cache, the staged photo
//! and the notice board together and drives a submission through
//! [`save_registration`]. Every state change publishes a fresh
//! [`FormView`] on a watch channel, so any number of observers can render
//! the form without the form knowing about them.
//!
//! All methods take `&self`. State sits behind a mutex that is never held
//! across an await, which lets edits continue while a submission is in
//! flight and lets a second submission see that one already is.
//!
//! Each posted notice schedules a timer on the current tokio runtime that
//! clears it at its deadline and publishes the change.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, error, info, trace};

use crate::backend::Backend;
use crate::config::Config;
use crate::draft::{DraftEdit, DraftStore, RegistrationDraft};
use crate::notice::{Notice, NoticeBoard, NoticeKind};
use crate::photo::{AttachmentRejection, PhotoFile, PhotoSlot, PreviewRegistry, DEFAULT_MAX_PHOTO_BYTES};
use crate::register::{save_registration, SavedRegistration};
use crate::validate::{validate, ValidationIssue};

/// Shown after a registration was stored.
pub const SUCCESS_MESSAGE: &str = "Thank you for registering. We will contact you soon.";

/// Shown when the backend failed.
pub const FAILURE_MESSAGE: &str = "Something went wrong. Please try again.";

/// Limits and notice durations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormSettings {
    /// Largest accepted photo.
    pub max_photo_bytes: u64,
    /// How long submission notices show.
    pub notice_ttl: Duration,
    /// How long photo rejection notices show.
    pub rejection_notice_ttl: Duration,
}

impl Default for FormSettings {
    fn default() -> Self {
        Self {
            max_photo_bytes: DEFAULT_MAX_PHOTO_BYTES,
            notice_ttl: Duration::from_millis(2_500),
            rejection_notice_ttl: Duration::from_millis(2_200),
        }
    }
}

impl FormSettings {
    /// Read the settings from the configuration.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_photo_bytes: config.form.max_photo_bytes,
            notice_ttl: config.notice_ttl(),
            rejection_notice_ttl: config.rejection_notice_ttl(),
        }
    }
}

/// Whether a submission is in flight.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Phase {
    /// Ready to submit.
    #[default]
    Idle,
    /// Waiting on the backend.
    Submitting,
}

/// What observers see of the staged photo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhotoSummary {
    /// File name.
    pub name: String,
    /// Size in bytes.
    pub size: u64,
    /// Address the preview resolves from.
    pub preview_address: String,
}

/// Snapshot of the form for rendering.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormView {
    /// Current field values.
    pub draft: RegistrationDraft,
    /// Staged photo.
    pub photo: Option<PhotoSummary>,
    /// Notice showing, if any.
    pub notice: Option<Notice>,
    /// Submission phase.
    pub phase: Phase,
}

/// Result of [`RegistrationForm::submit`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Validation failed; nothing was sent.
    Invalid(ValidationIssue),
    /// The registration was stored and the form reset.
    Submitted(SavedRegistration),
    /// The backend failed; the form is unchanged.
    Failed,
    /// Another submission is still in flight.
    Busy,
}

impl SubmitOutcome {
    /// Check whether the registration was stored.
    #[must_use]
    pub fn is_submitted(&self) -> bool {
        matches!(self, Self::Submitted(_))
    }
}

#[derive(Debug)]
struct FormState {
    draft: RegistrationDraft,
    photo: PhotoSlot,
    notices: NoticeBoard,
    phase: Phase,
}

impl FormState {
    fn snapshot(&self) -> FormView {
        FormView {
            draft: self.draft.clone(),
            photo: self.photo.current().map(|a| PhotoSummary {
                name: a.file().name.clone(),
                size: a.file().size(),
                preview_address: a.preview_address().to_string(),
            }),
            notice: self.notices.current().cloned(),
            phase: self.phase,
        }
    }
}

/// State and its publisher, shared with notice expiry timers.
#[derive(Debug)]
struct Shared {
    state: Mutex<FormState>,
    view: watch::Sender<FormView>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, FormState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, state: &FormState) {
        self.view.send_replace(state.snapshot());
    }
}

/// The registration form and its submission lifecycle.
#[derive(Debug)]
pub struct RegistrationForm {
    shared: Arc<Shared>,
    store: DraftStore,
    settings: FormSettings,
}

impl RegistrationForm {
    /// Create a form hydrated from the cached draft.
    #[must_use]
    pub fn new(store: DraftStore, previews: PreviewRegistry, settings: FormSettings) -> Self {
        let state = FormState {
            draft: store.load(),
            photo: PhotoSlot::new(previews, settings.max_photo_bytes),
            notices: NoticeBoard::new(),
            phase: Phase::Idle,
        };
        let (view, _) = watch::channel(state.snapshot());
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(state),
                view,
            }),
            store,
            settings,
        }
    }

    fn lock(&self) -> MutexGuard<'_, FormState> {
        self.shared.lock()
    }

    fn publish(&self, state: &FormState) {
        self.shared.publish(state);
    }

    /// Post a notice and arrange for it to be cleared when it expires.
    fn post_notice(
        &self,
        state: &mut FormState,
        message: impl Into<String>,
        kind: NoticeKind,
        ttl: Duration,
    ) {
        let expires_at = state.notices.post(message, kind, ttl).expires_at;
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            debug!("No runtime; notice will not be cleared on expiry");
            return;
        };
        runtime.spawn(expire_notice(Arc::downgrade(&self.shared), expires_at));
    }

    /// Observe the form.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<FormView> {
        self.shared.view.subscribe()
    }

    /// Current snapshot.
    #[must_use]
    pub fn view(&self) -> FormView {
        self.lock().snapshot()
    }

    /// Current field values.
    #[must_use]
    pub fn draft(&self) -> RegistrationDraft {
        self.lock().draft.clone()
    }

    /// The notice showing now, if any.
    #[must_use]
    pub fn notice(&self) -> Option<Notice> {
        self.lock().notices.current().cloned()
    }

    /// Submission phase.
    #[must_use]
    pub fn phase(&self) -> Phase {
        self.lock().phase
    }

    /// Change one field and cache the result.
    pub fn edit(&self, edit: DraftEdit) {
        let mut state = self.lock();
        let next = state.draft.apply(edit);
        if next == state.draft {
            return;
        }
        state.draft = next;
        self.store.save(&state.draft);
        self.publish(&state);
    }

    /// Stage a photo, replacing any staged one.
    ///
    /// # Errors
    ///
    /// Returns the rejection, also posted as a notice, when the file is
    /// not an accepted image or too large. The staged photo is kept.
    pub fn pick_photo(&self, file: PhotoFile) -> Result<(), AttachmentRejection> {
        let mut state = self.lock();
        let picked = state.photo.pick(file);
        if let Err(rejection) = &picked {
            debug!(%rejection, "Photo rejected");
            self.post_notice(
                &mut state,
                rejection.to_string(),
                NoticeKind::Correction,
                self.settings.rejection_notice_ttl,
            );
        }
        self.publish(&state);
        picked
    }

    /// Drop the staged photo.
    pub fn remove_photo(&self) {
        let mut state = self.lock();
        state.photo.remove();
        self.publish(&state);
    }

    /// Validate and store the registration.
    ///
    /// On success the draft, its cache and the photo are cleared. On any
    /// backend failure they are left as they were so the registrant can
    /// try again.
    pub async fn submit(&self, backend: &Backend) -> SubmitOutcome {
        let (draft, photo) = {
            let mut state = self.lock();
            if state.phase == Phase::Submitting {
                return SubmitOutcome::Busy;
            }
            if let Err(issue) = validate(&state.draft) {
                self.post_notice(
                    &mut state,
                    issue.to_string(),
                    NoticeKind::Correction,
                    self.settings.notice_ttl,
                );
                self.publish(&state);
                return SubmitOutcome::Invalid(issue);
            }
            state.phase = Phase::Submitting;
            self.publish(&state);
            (
                state.draft.clone(),
                state.photo.current().map(|a| a.file().clone()),
            )
        };

        let _guard = SubmittingGuard { form: self };
        let saved = save_registration(backend, &draft, photo.as_ref()).await;

        let mut state = self.lock();
        let outcome = match saved {
            Ok(saved) => {
                info!(id = %saved.id, "Registration submitted");
                self.post_notice(
                    &mut state,
                    SUCCESS_MESSAGE,
                    NoticeKind::Success,
                    self.settings.notice_ttl,
                );
                state.photo.remove();
                state.draft = RegistrationDraft::default();
                self.store.clear();
                SubmitOutcome::Submitted(saved)
            }
            Err(e) => {
                error!(error = %e, "Registration failed");
                self.post_notice(
                    &mut state,
                    FAILURE_MESSAGE,
                    NoticeKind::Failure,
                    self.settings.notice_ttl,
                );
                SubmitOutcome::Failed
            }
        };
        state.phase = Phase::Idle;
        self.publish(&state);
        drop(state);
        outcome
    }
}

/// Clear the notice once `deadline` passes, unless the form is gone.
async fn expire_notice(shared: Weak<Shared>, deadline: Instant) {
    tokio::time::sleep_until(deadline).await;
    let Some(shared) = shared.upgrade() else {
        return;
    };
    let mut state = shared.lock();
    if state.notices.clear_expired() {
        trace!("Notice expired");
        shared.publish(&state);
    }
}

/// Returns the form to idle if a submission is abandoned mid-flight.
struct SubmittingGuard<'a> {
    form: &'a RegistrationForm,
}

impl Drop for SubmittingGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.form.lock();
        if state.phase == Phase::Submitting {
            debug!("Submission abandoned");
            state.phase = Phase::Idle;
            self.form.publish(&state);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::backend::memory::{Journal, MemoryBlobStore, MemoryIdentity, MemoryRecordStore};
    use crate::draft::{Industry, Role};
    use crate::local_store::{LocalStore, MemoryLocalStore};
    use crate::session::{Session, SessionSettings};

    const KEY: &str = "gtif_form";

    struct Harness {
        form: RegistrationForm,
        local: Arc<MemoryLocalStore>,
        previews: PreviewRegistry,
        backend: Backend,
        records: Arc<MemoryRecordStore>,
        blobs: Arc<MemoryBlobStore>,
        journal: Journal,
    }

    fn harness_with(identity: MemoryIdentity) -> Harness {
        let local = Arc::new(MemoryLocalStore::new());
        let previews = PreviewRegistry::new();
        let form = RegistrationForm::new(
            DraftStore::new(local.clone(), KEY),
            previews.clone(),
            FormSettings::default(),
        );

        let journal = Journal::new();
        let records = Arc::new(MemoryRecordStore::with_journal(journal.clone()));
        let blobs = Arc::new(MemoryBlobStore::with_journal(journal.clone()));
        let session = Session::start(Arc::new(identity), SessionSettings::default());
        Harness {
            form,
            local,
            previews,
            backend: Backend::new(session, records.clone(), blobs.clone()),
            records,
            blobs,
            journal,
        }
    }

    fn harness() -> Harness {
        harness_with(MemoryIdentity::new())
    }

    fn fill(form: &RegistrationForm) {
        form.edit(DraftEdit::FullName("Abena Owusu".to_string()));
        form.edit(DraftEdit::Email("abena@example.com".to_string()));
        form.edit(DraftEdit::Company("Kumasi Cocoa".to_string()));
        form.edit(DraftEdit::Industry(Some(Industry::Agriculture)));
        form.edit(DraftEdit::Role(Some(Role::Participant)));
    }

    fn png(size: usize) -> PhotoFile {
        PhotoFile::new("face.png", "image/png", vec![1; size])
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_draft_makes_no_backend_calls() {
        let h = harness();
        h.form.edit(DraftEdit::Email("a@b.com".to_string()));
        h.form.edit(DraftEdit::Industry(Some(Industry::Tourism)));
        h.form.edit(DraftEdit::Role(Some(Role::Participant)));

        let outcome = h.form.submit(&h.backend).await;

        assert_eq!(outcome, SubmitOutcome::Invalid(ValidationIssue::MissingFullName));
        assert_eq!(h.form.notice().unwrap().message, "Please enter your full name");
        assert!(h.journal.entries().is_empty());
        assert_eq!(h.form.phase(), Phase::Idle);
        assert_eq!(h.form.draft().email, "a@b.com");
    }

    #[tokio::test(start_paused = true)]
    async fn test_submit_without_photo_resets_form() {
        let h = harness();
        fill(&h.form);
        assert!(h.local.get(KEY).unwrap().is_some());

        let saved = match h.form.submit(&h.backend).await {
            SubmitOutcome::Submitted(saved) => saved,
            other => panic!("expected submission, got {other:?}"),
        };
        assert_eq!(saved.record.photo_url, "");
        assert_eq!(saved.record.full_name, "Abena Owusu");
        assert_eq!(h.records.records().len(), 1);
        assert!(h.form.draft().is_empty());
        assert!(h.local.get(KEY).unwrap().is_none());
        assert_eq!(h.form.notice().unwrap().message, SUCCESS_MESSAGE);
    }

    #[tokio::test(start_paused = true)]
    async fn test_submit_with_photo_uploads_first() {
        let h = harness();
        fill(&h.form);
        h.form.pick_photo(png(1024 * 1024)).unwrap();
        assert_eq!(h.previews.live_count(), 1);

        let saved = match h.form.submit(&h.backend).await {
            SubmitOutcome::Submitted(saved) => saved,
            other => panic!("expected submission, got {other:?}"),
        };

        let key = format!("photos/{}.png", saved.id);
        let entries = h.journal.entries();
        assert_eq!(entries[0], format!("upload {key}"));
        assert_eq!(entries.last().unwrap(), &format!("create {}", saved.id));
        assert_eq!(saved.record.photo_url, format!("https://blobs.test/{key}"));
        assert_eq!(h.blobs.get(&key).unwrap().bytes.len(), 1024 * 1024);

        assert!(h.form.view().photo.is_none());
        assert_eq!(h.previews.live_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejected_pick_keeps_existing_photo() {
        let h = harness();
        h.form.pick_photo(png(10)).unwrap();
        let before = h.form.view().photo.unwrap();

        let rejection = h
            .form
            .pick_photo(PhotoFile::new("cv.pdf", "application/pdf", vec![0; 10]))
            .unwrap_err();

        assert_eq!(rejection.to_string(), "Please upload an image file");
        assert_eq!(h.form.view().photo.unwrap(), before);
        assert_eq!(h.previews.live_count(), 1);

        let notice = h.form.notice().unwrap();
        assert_eq!(notice.message, "Please upload an image file");
        tokio::time::advance(Duration::from_millis(2_200)).await;
        assert!(h.form.notice().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_notice_is_published() {
        let h = harness();
        let mut rx = h.form.subscribe();
        let started = tokio::time::Instant::now();

        h.form
            .pick_photo(PhotoFile::new("cv.pdf", "application/pdf", vec![0; 10]))
            .unwrap_err();
        assert!(rx.borrow_and_update().notice.is_some());

        tokio::time::timeout(Duration::from_secs(5), rx.changed())
            .await
            .unwrap()
            .unwrap();
        assert!(rx.borrow_and_update().notice.is_none());
        assert!(started.elapsed() >= Duration::from_millis(2_200));
        assert!(h.form.notice().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_newer_notice_outlives_earlier_timer() {
        let h = harness();
        let mut rx = h.form.subscribe();
        let started = tokio::time::Instant::now();

        h.form
            .pick_photo(PhotoFile::new("cv.pdf", "application/pdf", vec![0; 10]))
            .unwrap_err();
        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(!h.form.submit(&h.backend).await.is_submitted());
        assert_eq!(
            rx.borrow_and_update().notice.as_ref().map(|n| n.message.as_str()),
            Some("Please enter your full name")
        );

        // The rejection notice's deadline passes; the newer one stays.
        tokio::time::advance(Duration::from_millis(1_300)).await;
        tokio::task::yield_now().await;
        assert!(!rx.has_changed().unwrap());
        assert_eq!(h.form.notice().unwrap().message, "Please enter your full name");

        tokio::time::timeout(Duration::from_secs(5), rx.changed())
            .await
            .unwrap()
            .unwrap();
        assert!(rx.borrow_and_update().notice.is_none());
        assert!(started.elapsed() >= Duration::from_millis(3_500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_submission_proceeds_after_session_timeout() {
        let h = harness_with(MemoryIdentity::unreachable());
        fill(&h.form);
        h.records.set_fail_writes(true);

        let started = tokio::time::Instant::now();
        let outcome = h.form.submit(&h.backend).await;

        assert_eq!(outcome, SubmitOutcome::Failed);
        assert!(started.elapsed() >= Duration::from_secs(4));
        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(h.records.write_attempts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_preserves_draft_and_photo() {
        crate::logging::init_test_logging();
        let h = harness();
        fill(&h.form);
        h.form.pick_photo(png(100)).unwrap();
        let draft = h.form.draft();
        h.records.set_fail_writes(true);

        let outcome = h.form.submit(&h.backend).await;

        assert_eq!(outcome, SubmitOutcome::Failed);
        assert_eq!(h.form.draft(), draft);
        assert!(h.form.view().photo.is_some());
        assert!(h.local.get(KEY).unwrap().is_some());
        let notice = h.form.notice().unwrap();
        assert_eq!(notice.message, FAILURE_MESSAGE);
        assert_eq!(notice.kind, NoticeKind::Failure);

        // No automatic retry; a manual one succeeds.
        assert_eq!(h.records.write_attempts(), 1);
        h.records.set_fail_writes(false);
        assert!(h.form.submit(&h.backend).await.is_submitted());
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_submit_while_in_flight_is_busy() {
        let h = harness_with(MemoryIdentity::unreachable());
        fill(&h.form);

        let (first, second) = tokio::join!(h.form.submit(&h.backend), async {
            tokio::task::yield_now().await;
            h.form.submit(&h.backend).await
        });

        assert!(first.is_submitted());
        assert_eq!(second, SubmitOutcome::Busy);
        assert_eq!(h.records.write_attempts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_submit_returns_to_idle() {
        let h = harness_with(MemoryIdentity::unreachable());
        fill(&h.form);

        let attempt = tokio::time::timeout(Duration::from_secs(1), h.form.submit(&h.backend)).await;

        assert!(attempt.is_err());
        assert_eq!(h.form.phase(), Phase::Idle);
        assert_eq!(h.records.write_attempts(), 0);
    }

    #[tokio::test]
    async fn test_hydrates_and_caches_edits() {
        let local = Arc::new(MemoryLocalStore::new());
        local
            .set(KEY, r#"{"fullName":"Yaa","email":"yaa@example.com","role":"Exhibitor"}"#)
            .unwrap();

        let form = RegistrationForm::new(
            DraftStore::new(local.clone(), KEY),
            PreviewRegistry::new(),
            FormSettings::default(),
        );
        assert_eq!(form.draft().full_name, "Yaa");
        assert_eq!(form.draft().role, Some(Role::Exhibitor));

        form.edit(DraftEdit::Message("Vegetarian meals".to_string()));
        let cached = local.get(KEY).unwrap().unwrap();
        assert!(cached.contains("Vegetarian meals"));
        assert!(!cached.contains("preview"));
    }

    #[tokio::test]
    async fn test_observers_see_each_change() {
        let h = harness();
        let mut rx = h.form.subscribe();
        rx.borrow_and_update();

        h.form.edit(DraftEdit::FullName("Kojo".to_string()));
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().draft.full_name, "Kojo");

        h.form.pick_photo(png(5)).unwrap();
        assert!(rx.has_changed().unwrap());
        let view = rx.borrow_and_update().clone();
        let address = view.photo.unwrap().preview_address;
        assert!(h.previews.resolve(&address).is_some());

        h.form.remove_photo();
        assert!(rx.borrow_and_update().photo.is_none());
        assert!(h.previews.resolve(&address).is_none());
    }

    #[test]
    fn test_settings_from_config() {
        let mut config = Config::default();
        config.form.rejection_notice_ms = 1_000;
        let settings = FormSettings::from_config(&config);
        assert_eq!(settings.rejection_notice_ttl, Duration::from_secs(1));
        assert_eq!(settings.notice_ttl, Duration::from_millis(2_500));
    }
}
