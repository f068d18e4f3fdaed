//! Domain model for journal entries, habits and accounts.
//!
//! # Responsibility
//! - Define canonical records used by core business logic.
//! - Own the `kind` state machine of journal entries.
//!
//! # Invariants
//! - Every record is identified by a stable, non-nil UUID.
//! - Deletion is represented by `deleted_at` tombstones, not hard delete.
//! - Timestamps are Unix epoch milliseconds (UTC).

use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod entry;
pub mod habit;
pub mod user;

/// Returns the current instant as Unix epoch milliseconds.
pub fn now_epoch_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Structural validation failure shared by all persisted records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordValidationError {
    /// Record id is the nil UUID.
    NilId,
    /// Owner reference is the nil UUID.
    NilOwner,
    /// Text content is empty after trim.
    BlankText,
    /// Email does not look like `local@domain.tld`.
    InvalidEmail(String),
    /// A timestamp precedes `created_at`.
    TimestampBeforeCreation {
        field: &'static str,
        value: i64,
        created_at: i64,
    },
}

impl Display for RecordValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NilId => write!(f, "id must not be nil"),
            Self::NilOwner => write!(f, "owner must not be nil"),
            Self::BlankText => write!(f, "text must not be blank"),
            Self::InvalidEmail(value) => write!(f, "invalid email address `{value}`"),
            Self::TimestampBeforeCreation {
                field,
                value,
                created_at,
            } => write!(
                f,
                "{field} ({value}) must be >= created_at ({created_at})"
            ),
        }
    }
}

impl Error for RecordValidationError {}
