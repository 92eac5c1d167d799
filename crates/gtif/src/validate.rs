//! Registration form validation.
//!
//! [`validate`] is a pure function of the draft. Checks run in a fixed order
//! and stop at the first failure, so the reason always names the first field
//! the registrant still has to fix.

use std::sync::OnceLock;

use regex::Regex;

use crate::draft::RegistrationDraft;

/// Email shape accepted by the form: something, `@`, something, `.`, something.
const EMAIL_PATTERN: &str = r"^[^\s@]+@[^\s@]+\.[^\s@]+$";

/// Why a draft cannot be submitted yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ValidationIssue {
    /// Full name is blank.
    #[error("Please enter your full name")]
    MissingFullName,
    /// Email does not look like an address.
    #[error("Enter a valid email")]
    InvalidEmail,
    /// No industry selected.
    #[error("Please select your industry")]
    MissingIndustry,
    /// No role selected.
    #[error("Please choose a role")]
    MissingRole,
}

fn email_regex() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| Regex::new(EMAIL_PATTERN).expect("email pattern is valid"))
}

/// Check whether `email` has the accepted shape.
#[must_use]
pub fn is_valid_email(email: &str) -> bool {
    email_regex().is_match(email)
}

/// Validate a draft for submission.
///
/// The photo is never required.
///
/// # Errors
///
/// Returns the first [`ValidationIssue`] in check order.
pub fn validate(draft: &RegistrationDraft) -> Result<(), ValidationIssue> {
    if draft.full_name.trim().is_empty() {
        return Err(ValidationIssue::MissingFullName);
    }
    if !is_valid_email(&draft.email) {
        return Err(ValidationIssue::InvalidEmail);
    }
    if draft.industry.is_none() {
        return Err(ValidationIssue::MissingIndustry);
    }
    if draft.role.is_none() {
        return Err(ValidationIssue::MissingRole);
    }
    Ok(())
}
