//! Journal entry domain model.
//!
//! # Responsibility
//! - Define the canonical journal entry record (log, todo or habit).
//! - Provide the completion and habitization transitions.
//!
//! # Invariants
//! - `kind` only moves from `Log`/`Todo` to `Habit`, never away from `Habit`.
//! - `completed_at` and `deleted_at` are set at most once and never cleared.
//! - `owner` never changes after creation.

use crate::model::user::UserId;
use crate::model::{now_epoch_ms, RecordValidationError};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use uuid::Uuid;

/// Stable identifier of a journal entry.
pub type EntryId = Uuid;

/// Category of a journal entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    /// Plain journal log.
    #[default]
    Log,
    /// Scheduled todo; requires `scheduled_for` at creation.
    Todo,
    /// Recurring habit. Terminal state.
    Habit,
}

impl EntryKind {
    /// Stable storage/wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Log => "log",
            Self::Todo => "todo",
            Self::Habit => "habit",
        }
    }
}

impl Display for EntryKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unknown entry kind name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownEntryKind(pub String);

impl Display for UnknownEntryKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "`{}` is not a valid entry type; expected habit|log|todo",
            self.0
        )
    }
}

impl Error for UnknownEntryKind {}

impl FromStr for EntryKind {
    type Err = UnknownEntryKind;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "log" => Ok(Self::Log),
            "todo" => Ok(Self::Todo),
            "habit" => Ok(Self::Habit),
            other => Err(UnknownEntryKind(other.to_string())),
        }
    }
}

/// Rejected state transition on a journal entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryTransitionError {
    /// `completed_at` is already set.
    AlreadyCompleted,
    /// `kind` is already `Habit`.
    AlreadyHabit,
    /// Entry carries a soft-delete tombstone.
    Deleted,
}

impl Display for EntryTransitionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AlreadyCompleted => write!(f, "Log is already marked as done."),
            Self::AlreadyHabit => write!(f, "This log is already a habit"),
            Self::Deleted => write!(f, "entry is deleted"),
        }
    }
}

impl Error for EntryTransitionError {}

/// Canonical journal entry record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub id: EntryId,
    pub owner: UserId,
    /// Serialized as `type` to match external schema naming.
    #[serde(rename = "type")]
    pub kind: EntryKind,
    pub text: String,
    /// Epoch ms. Present for every entry created as a todo.
    pub scheduled_for: Option<i64>,
    pub completed_at: Option<i64>,
    pub deleted_at: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl JournalEntry {
    /// Creates a new entry with a generated id, stamped with the current time.
    pub fn new(owner: UserId, kind: EntryKind, text: impl Into<String>) -> Self {
        let now = now_epoch_ms();
        Self {
            id: Uuid::new_v4(),
            owner,
            kind,
            text: text.into(),
            scheduled_for: None,
            completed_at: None,
            deleted_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Checks structural invariants before persistence.
    pub fn validate(&self) -> Result<(), RecordValidationError> {
        if self.id.is_nil() {
            return Err(RecordValidationError::NilId);
        }
        if self.owner.is_nil() {
            return Err(RecordValidationError::NilOwner);
        }
        if self.text.trim().is_empty() {
            return Err(RecordValidationError::BlankText);
        }
        for (field, value) in [
            ("completed_at", self.completed_at),
            ("deleted_at", self.deleted_at),
        ] {
            if let Some(value) = value {
                if value < self.created_at {
                    return Err(RecordValidationError::TimestampBeforeCreation {
                        field,
                        value,
                        created_at: self.created_at,
                    });
                }
            }
        }
        Ok(())
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    pub fn is_completed(&self) -> bool {
        self.completed_at.is_some()
    }

    /// Sets `completed_at` once.
    pub fn mark_completed(&mut self, at: i64) -> Result<(), EntryTransitionError> {
        if self.is_deleted() {
            return Err(EntryTransitionError::Deleted);
        }
        if self.is_completed() {
            return Err(EntryTransitionError::AlreadyCompleted);
        }
        self.completed_at = Some(at);
        self.updated_at = at;
        Ok(())
    }

    /// Moves a log or todo into the terminal `Habit` kind.
    pub fn habitize(&mut self, at: i64) -> Result<(), EntryTransitionError> {
        if self.is_deleted() {
            return Err(EntryTransitionError::Deleted);
        }
        if self.kind == EntryKind::Habit {
            return Err(EntryTransitionError::AlreadyHabit);
        }
        self.kind = EntryKind::Habit;
        self.updated_at = at;
        Ok(())
    }

    /// Sets the soft-delete tombstone. Returns `false` when already deleted.
    pub fn soft_delete(&mut self, at: i64) -> bool {
        if self.is_deleted() {
            return false;
        }
        self.deleted_at = Some(at);
        self.updated_at = at;
        true
    }
}
