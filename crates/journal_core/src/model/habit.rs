//! Habit domain model.
//!
//! A habit is either created directly or derived from a journal entry during
//! habitization. The link to its source entry is a weak relation: removing
//! the entry nulls the link and never removes the habit.

use crate::model::entry::{EntryId, JournalEntry};
use crate::model::user::UserId;
use crate::model::{now_epoch_ms, RecordValidationError};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable identifier of a habit.
pub type HabitId = Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Habit {
    pub id: HabitId,
    pub owner: UserId,
    pub text: String,
    pub source_entry: Option<EntryId>,
    pub deleted_at: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Habit {
    /// Creates a standalone habit.
    pub fn new(owner: UserId, text: impl Into<String>) -> Self {
        let now = now_epoch_ms();
        Self {
            id: Uuid::new_v4(),
            owner,
            text: text.into(),
            source_entry: None,
            deleted_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Creates the companion habit of `entry`, copying its current text and owner.
    pub fn from_entry(entry: &JournalEntry) -> Self {
        let mut habit = Self::new(entry.owner, entry.text.clone());
        habit.source_entry = Some(entry.id);
        habit
    }

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
        Ok(())
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}
