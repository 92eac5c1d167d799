//! Registration draft and its local cache.
//!
//! A [`RegistrationDraft`] holds the six text and choice fields of the form.
//! Edits are pure: [`RegistrationDraft::apply`] returns the next draft and
//! leaves the current one untouched. [`DraftStore`] mirrors drafts into a
//! [`LocalStore`] so an unfinished registration survives a restart.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::local_store::LocalStore;

/// The industries a registrant can choose from, in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Industry {
    /// Mining & Resources
    MiningAndResources,
    /// Real Estate
    RealEstate,
    /// Agriculture
    Agriculture,
    /// Manufacturing
    Manufacturing,
    /// Tourism
    Tourism,
    /// Banking and Finance
    BankingAndFinance,
    /// Telecommunications
    Telecommunications,
    /// Other
    Other,
}

impl Industry {
    /// Every industry, in display order.
    pub const ALL: [Industry; 8] = [
        Self::MiningAndResources,
        Self::RealEstate,
        Self::Agriculture,
        Self::Manufacturing,
        Self::Tourism,
        Self::BankingAndFinance,
        Self::Telecommunications,
        Self::Other,
    ];

    /// The label shown to users and stored in records.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::MiningAndResources => "Mining & Resources",
            Self::RealEstate => "Real Estate",
            Self::Agriculture => "Agriculture",
            Self::Manufacturing => "Manufacturing",
            Self::Tourism => "Tourism",
            Self::BankingAndFinance => "Banking and Finance",
            Self::Telecommunications => "Telecommunications",
            Self::Other => "Other",
        }
    }

    /// Short command-line friendly name.
    #[must_use]
    pub fn slug(self) -> &'static str {
        match self {
            Self::MiningAndResources => "mining",
            Self::RealEstate => "real-estate",
            Self::Agriculture => "agriculture",
            Self::Manufacturing => "manufacturing",
            Self::Tourism => "tourism",
            Self::BankingAndFinance => "banking",
            Self::Telecommunications => "telecommunications",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for Industry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Error returned when parsing an unknown industry or role.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind}: {value}")]
pub struct UnknownChoice {
    kind: &'static str,
    value: String,
}

impl FromStr for Industry {
    type Err = UnknownChoice;

    /// Accepts the display label or the slug, ignoring ASCII case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Self::ALL
            .into_iter()
            .find(|i| i.label().eq_ignore_ascii_case(s) || i.slug().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownChoice {
                kind: "industry",
                value: s.to_string(),
            })
    }
}

/// How a registrant takes part in the forum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    /// Attends the sessions.
    Participant,
    /// Runs a stand.
    Exhibitor,
}

impl Role {
    /// The stored label.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Participant => "Participant",
            Self::Exhibitor => "Exhibitor",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Role {
    type Err = UnknownChoice;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            v if v.eq_ignore_ascii_case("participant") => Ok(Self::Participant),
            v if v.eq_ignore_ascii_case("exhibitor") => Ok(Self::Exhibitor),
            v => Err(UnknownChoice {
                kind: "role",
                value: v.to_string(),
            }),
        }
    }
}

/// The in-progress registration form contents.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistrationDraft {
    /// Registrant's full name.
    pub full_name: String,
    /// Contact email.
    pub email: String,
    /// Company, may be empty.
    pub company: String,
    /// Selected industry.
    pub industry: Option<Industry>,
    /// Selected role.
    pub role: Option<Role>,
    /// Message or special requirements, may be empty.
    pub message: String,
}

/// A single change to one draft field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DraftEdit {
    /// Replace the full name.
    FullName(String),
    /// Replace the email.
    Email(String),
    /// Replace the company.
    Company(String),
    /// Select or clear the industry.
    Industry(Option<Industry>),
    /// Select or clear the role.
    Role(Option<Role>),
    /// Replace the message.
    Message(String),
}

impl RegistrationDraft {
    /// Return the draft that results from applying `edit`.
    #[must_use]
    pub fn apply(&self, edit: DraftEdit) -> Self {
        let mut next = self.clone();
        match edit {
            DraftEdit::FullName(v) => next.full_name = v,
            DraftEdit::Email(v) => next.email = v,
            DraftEdit::Company(v) => next.company = v,
            DraftEdit::Industry(v) => next.industry = v,
            DraftEdit::Role(v) => next.role = v,
            DraftEdit::Message(v) => next.message = v,
        }
        next
    }

    /// Check if every field is unset.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Wire shape of the cached draft.
///
/// Fields are read one at a time from a JSON object. A field that is
/// missing, not a string, or names an unknown choice reads as unset and
/// the others are kept.
#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
struct StoredDraft {
    full_name: Option<String>,
    email: Option<String>,
    company: Option<String>,
    industry: Option<String>,
    message: Option<String>,
    role: Option<String>,
}

impl StoredDraft {
    /// Read the fields of a JSON object. Anything else is `None`.
    fn from_value(value: &serde_json::Value) -> Option<Self> {
        let fields = value.as_object()?;
        let text = |key: &str| {
            fields
                .get(key)
                .and_then(serde_json::Value::as_str)
                .map(str::to_string)
        };
        Some(Self {
            full_name: text("fullName"),
            email: text("email"),
            company: text("company"),
            industry: text("industry"),
            message: text("message"),
            role: text("role"),
        })
    }
}

impl From<&RegistrationDraft> for StoredDraft {
    fn from(d: &RegistrationDraft) -> Self {
        Self {
            full_name: Some(d.full_name.clone()),
            email: Some(d.email.clone()),
            company: Some(d.company.clone()),
            industry: Some(d.industry.map(|i| i.label().to_string()).unwrap_or_default()),
            message: Some(d.message.clone()),
            role: Some(d.role.map(|r| r.label().to_string()).unwrap_or_default()),
        }
    }
}

impl From<StoredDraft> for RegistrationDraft {
    fn from(s: StoredDraft) -> Self {
        Self {
            full_name: s.full_name.unwrap_or_default(),
            email: s.email.unwrap_or_default(),
            company: s.company.unwrap_or_default(),
            industry: s.industry.and_then(|v| v.parse().ok()),
            role: s.role.and_then(|v| v.parse().ok()),
            message: s.message.unwrap_or_default(),
        }
    }
}

/// Mirrors the draft into the local key-value store.
///
/// Reads fail open: a missing or damaged entry loads as an empty draft.
/// Writes are best effort; a failure is logged and editing carries on.
#[derive(Debug, Clone)]
pub struct DraftStore {
    store: Arc<dyn LocalStore>,
    key: String,
}

impl DraftStore {
    /// Create a draft store writing under `key`.
    #[must_use]
    pub fn new(store: Arc<dyn LocalStore>, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
        }
    }

    /// The key the draft is stored under.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Load the cached draft, or an empty one.
    #[must_use]
    pub fn load(&self) -> RegistrationDraft {
        let raw = match self.store.get(&self.key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return RegistrationDraft::default(),
            Err(e) => {
                warn!(key = %self.key, error = %e, "Could not read cached draft");
                return RegistrationDraft::default();
            }
        };

        let value = match serde_json::from_str::<serde_json::Value>(&raw) {
            Ok(value) => value,
            Err(e) => {
                debug!(key = %self.key, error = %e, "Ignoring malformed cached draft");
                return RegistrationDraft::default();
            }
        };
        if let Some(stored) = StoredDraft::from_value(&value) {
            debug!(key = %self.key, "Hydrated draft from local store");
            stored.into()
        } else {
            debug!(key = %self.key, "Ignoring cached draft that is not an object");
            RegistrationDraft::default()
        }
    }

    /// Overwrite the cached draft.
    pub fn save(&self, draft: &RegistrationDraft) {
        let result = serde_json::to_string(&StoredDraft::from(draft))
            .map_err(crate::Error::from)
            .and_then(|json| self.store.set(&self.key, &json));
        if let Err(e) = result {
            warn!(key = %self.key, error = %e, "Could not cache draft");
        }
    }

    /// Remove the cached draft.
    pub fn clear(&self) {
        if let Err(e) = self.store.remove(&self.key) {
            warn!(key = %self.key, error = %e, "Could not clear cached draft");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::local_store::MemoryLocalStore;

    fn filled() -> RegistrationDraft {
        RegistrationDraft {
            full_name: "Ama Mensah".to_string(),
            email: "ama@example.com".to_string(),
            company: "Accra Cocoa Ltd".to_string(),
            industry: Some(Industry::Agriculture),
            role: Some(Role::Exhibitor),
            message: "Need a corner stand".to_string(),
        }
    }

    fn draft_store() -> (Arc<MemoryLocalStore>, DraftStore) {
        let local = Arc::new(MemoryLocalStore::new());
        let store = DraftStore::new(local.clone(), "gtif_form");
        (local, store)
    }

    #[test]
    fn test_industry_labels_in_order() {
        let labels: Vec<_> = Industry::ALL.iter().map(|i| i.label()).collect();
        assert_eq!(
            labels,
            [
                "Mining & Resources",
                "Real Estate",
                "Agriculture",
                "Manufacturing",
                "Tourism",
                "Banking and Finance",
                "Telecommunications",
                "Other",
            ]
        );
    }

    #[test]
    fn test_industry_parse() {
        assert_eq!("Tourism".parse::<Industry>(), Ok(Industry::Tourism));
        assert_eq!(
            "mining & resources".parse::<Industry>(),
            Ok(Industry::MiningAndResources)
        );
        assert_eq!("banking".parse::<Industry>(), Ok(Industry::BankingAndFinance));
        assert!("Space".parse::<Industry>().is_err());
        assert!("".parse::<Industry>().is_err());
    }

    #[test]
    fn test_role_parse_and_display() {
        assert_eq!("Participant".parse::<Role>(), Ok(Role::Participant));
        assert_eq!("exhibitor".parse::<Role>(), Ok(Role::Exhibitor));
        assert!("Speaker".parse::<Role>().is_err());
        assert_eq!(Role::Exhibitor.to_string(), "Exhibitor");
    }

    #[test]
    fn test_apply_is_pure() {
        let before = RegistrationDraft::default();
        let after = before.apply(DraftEdit::FullName("Kofi".to_string()));

        assert!(before.is_empty());
        assert_eq!(after.full_name, "Kofi");
        assert_eq!(
            after.apply(DraftEdit::Role(Some(Role::Participant))).role,
            Some(Role::Participant)
        );
        assert_eq!(after.apply(DraftEdit::Industry(None)).industry, None);
    }

    #[test]
    fn test_load_empty_store() {
        let (_, store) = draft_store();
        assert!(store.load().is_empty());
    }

    #[test]
    fn test_save_then_load_roundtrip() {
        let (_, store) = draft_store();
        store.save(&filled());
        assert_eq!(store.load(), filled());
    }

    #[test]
    fn test_saved_json_uses_camel_case_text_fields_only() {
        let (local, store) = draft_store();
        store.save(&filled());

        let raw = local.get("gtif_form").unwrap().unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        let obj = value.as_object().unwrap();

        let mut keys: Vec<_> = obj.keys().map(String::as_str).collect();
        keys.sort_unstable();
        assert_eq!(
            keys,
            ["company", "email", "fullName", "industry", "message", "role"]
        );
        assert_eq!(obj["industry"], "Agriculture");
        assert_eq!(obj["role"], "Exhibitor");
        assert!(obj.values().all(serde_json::Value::is_string));
    }

    #[test]
    fn test_load_ignores_malformed_json() {
        let (local, store) = draft_store();
        local.set("gtif_form", "{\"fullName\": ").unwrap();
        assert!(store.load().is_empty());

        local.set("gtif_form", "[1,2,3]").unwrap();
        assert!(store.load().is_empty());
    }

    #[test]
    fn test_load_keeps_good_fields_and_drops_unknown_choices() {
        let (local, store) = draft_store();
        local
            .set(
                "gtif_form",
                r#"{"fullName":"Yaw","industry":"Space","role":"Speaker","photoUrl":"blob:x"}"#,
            )
            .unwrap();

        let draft = store.load();
        assert_eq!(draft.full_name, "Yaw");
        assert_eq!(draft.industry, None);
        assert_eq!(draft.role, None);
        assert_eq!(draft.email, "");
    }

    #[test]
    fn test_load_drops_mistyped_fields_only() {
        let (local, store) = draft_store();
        local
            .set(
                "gtif_form",
                r#"{"fullName":"Yaw","email":5,"company":null,"industry":"Banking and Finance","message":["x"]}"#,
            )
            .unwrap();

        let draft = store.load();
        assert_eq!(draft.full_name, "Yaw");
        assert_eq!(draft.email, "");
        assert_eq!(draft.company, "");
        assert_eq!(draft.industry, Some(Industry::BankingAndFinance));
        assert_eq!(draft.message, "");
    }

    #[test]
    fn test_load_ignores_non_object_json() {
        let (local, store) = draft_store();
        local.set("gtif_form", r#"["Yaw","yaw@example.com"]"#).unwrap();
        assert!(store.load().is_empty());

        local.set("gtif_form", r#""Yaw""#).unwrap();
        assert!(store.load().is_empty());
    }

    #[test]
    fn test_clear_is_idempotent() {
        let (local, store) = draft_store();
        store.save(&filled());

        store.clear();
        let once = store.load();
        store.clear();
        let twice = store.load();

        assert!(once.is_empty());
        assert_eq!(once, twice);
        assert!(local.is_empty());
    }

    #[test]
    fn test_unset_choices_roundtrip_as_unset() {
        let (_, store) = draft_store();
        let draft = RegistrationDraft {
            full_name: "Esi".to_string(),
            ..RegistrationDraft::default()
        };
        store.save(&draft);
        assert_eq!(store.load(), draft);
    }
}
