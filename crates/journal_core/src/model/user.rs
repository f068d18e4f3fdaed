//! Account domain model.
//!
//! # Invariants
//! - `email` is stored trimmed and lowercased and is unique across accounts.
//! - `password_hash` is an argon2 PHC string and is never serialized.
//! - Deactivation flips `is_active`; accounts are never hard-deleted.

use crate::model::{now_epoch_ms, RecordValidationError};
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable identifier of a user account.
pub type UserId = Uuid;

/// Maximum stored phone number length.
pub const PHONE_NUMBER_MAX_CHARS: usize = 15;

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid email regex")
});

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone_number: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub is_active: bool,
    /// Administrator flag; staff may act on other users' records.
    pub is_staff: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

impl User {
    /// Creates an active, non-staff account. `email` must already be normalized.
    pub fn new(email: impl Into<String>, password_hash: impl Into<String>) -> Self {
        let now = now_epoch_ms();
        Self {
            id: Uuid::new_v4(),
            email: email.into(),
            password_hash: password_hash.into(),
            first_name: None,
            last_name: None,
            phone_number: None,
            date_of_birth: None,
            is_active: true,
            is_staff: false,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn validate(&self) -> Result<(), RecordValidationError> {
        if self.id.is_nil() {
            return Err(RecordValidationError::NilId);
        }
        if normalize_email(&self.email).as_deref() != Some(self.email.as_str()) {
            return Err(RecordValidationError::InvalidEmail(self.email.clone()));
        }
        Ok(())
    }

    /// `first last`, skipping missing parts.
    pub fn full_name(&self) -> String {
        [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Identity of this account as seen by domain services.
    pub fn as_requester(&self) -> Requester {
        Requester {
            user_id: self.id,
            is_staff: self.is_staff,
        }
    }
}

/// Authenticated principal on whose behalf an operation runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Requester {
    pub user_id: UserId,
    pub is_staff: bool,
}

impl Requester {
    /// Whether this requester may read or mutate records owned by `owner`.
    pub fn can_access(&self, owner: UserId) -> bool {
        self.is_staff || self.user_id == owner
    }
}

/// Trims and lowercases an email, returning `None` when it is malformed.
pub fn normalize_email(value: &str) -> Option<String> {
    let normalized = value.trim().to_lowercase();
    if EMAIL_RE.is_match(&normalized) {
        Some(normalized)
    } else {
        None
    }
}
