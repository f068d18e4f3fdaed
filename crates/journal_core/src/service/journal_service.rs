//! Journal use-case service.
//!
//! # Responsibility
//! - Validate entry creation input, one rule set per entry kind.
//! - Drive the completion and habitization transitions.
//! - Scope every lookup to the requester (staff may reach any owner).
//!
//! # Invariants
//! - A todo is never created without `scheduled_for`.
//! - Creating a habit entry and habitizing an entry each produce exactly one
//!   companion habit, written in the same transaction as the entry change.
//! - Records outside the requester's reach are reported as not found.

use crate::model::entry::{EntryId, EntryKind, EntryTransitionError, JournalEntry};
use crate::model::habit::{Habit, HabitId};
use crate::model::now_epoch_ms;
use crate::model::user::Requester;
use crate::repo::journal_repo::{EntryListQuery, HabitListQuery, JournalRepository};
use crate::repo::{RepoError, WriteOutcome};
use chrono::{Days, NaiveDate};
use log::info;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Upper bound on an explicit entry page size.
pub const ENTRIES_LIMIT_MAX: u32 = 200;

/// Service error for journal use-cases.
#[derive(Debug)]
pub enum JournalServiceError {
    /// Input rejected; `field` names the offending input field.
    Validation {
        field: &'static str,
        message: String,
    },
    /// Record missing, soft-deleted, or owned by someone else.
    NotFound(Uuid),
    /// Transition does not apply to the current state.
    Conflict(EntryTransitionError),
    /// Persistence-layer failure.
    Repo(RepoError),
}

impl JournalServiceError {
    fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: message.into(),
        }
    }
}

impl Display for JournalServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation { field, message } => write!(f, "{field}: {message}"),
            Self::NotFound(_) => write!(f, "Not found."),
            Self::Conflict(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for JournalServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Conflict(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for JournalServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound(id) => Self::NotFound(id),
            RepoError::Duplicate("habits.source_entry_id") => {
                Self::Conflict(EntryTransitionError::AlreadyHabit)
            }
            other => Self::Repo(other),
        }
    }
}

/// Input for entry creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateEntryRequest {
    pub text: String,
    pub kind: EntryKind,
    /// Epoch ms.
    pub scheduled_for: Option<i64>,
}

/// Listing filters. `date` matches the UTC calendar day of `created_at`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryFilter {
    pub date: Option<NaiveDate>,
    pub kind: Option<EntryKind>,
    pub limit: Option<u32>,
    pub offset: u32,
}

/// Journal service facade over repository implementations.
pub struct JournalService<R: JournalRepository> {
    repo: R,
}

impl<R: JournalRepository> JournalService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Creates an entry owned by the requester.
    ///
    /// A `habit` entry is stored together with its companion habit.
    pub fn create_entry(
        &mut self,
        requester: &Requester,
        request: CreateEntryRequest,
    ) -> Result<JournalEntry, JournalServiceError> {
        validate_create_request(&request)?;

        let mut entry = JournalEntry::new(requester.user_id, request.kind, request.text);
        entry.scheduled_for = request.scheduled_for;
        let companion = match entry.kind {
            EntryKind::Habit => Some(Habit::from_entry(&entry)),
            EntryKind::Log | EntryKind::Todo => None,
        };

        self.repo.create_entry(&entry, companion.as_ref())?;
        info!(
            "event=entry_create module=journal status=ok entry_id={} kind={} owner={}",
            entry.id, entry.kind, entry.owner
        );
        Ok(entry)
    }

    /// Loads one live entry visible to the requester.
    pub fn get_entry(
        &self,
        requester: &Requester,
        id: EntryId,
    ) -> Result<JournalEntry, JournalServiceError> {
        self.repo
            .get_entry(id, false)?
            .filter(|entry| requester.can_access(entry.owner))
            .ok_or(JournalServiceError::NotFound(id))
    }

    /// Lists the requester's live entries, newest first.
    pub fn list_entries(
        &self,
        requester: &Requester,
        filter: &EntryFilter,
    ) -> Result<Vec<JournalEntry>, JournalServiceError> {
        let mut query = EntryListQuery::for_owner(requester.user_id);
        query.kind = filter.kind;
        query.limit = normalize_entry_limit(filter.limit);
        query.offset = filter.offset;
        if let Some(date) = filter.date {
            let (from, before) = utc_day_bounds(date)?;
            query.created_from = Some(from);
            query.created_before = Some(before);
        }

        Ok(self.repo.list_entries(&query)?)
    }

    /// Marks an entry as done. A second call is a conflict and changes nothing.
    pub fn complete_entry(
        &self,
        requester: &Requester,
        id: EntryId,
    ) -> Result<JournalEntry, JournalServiceError> {
        let mut entry = self.get_entry(requester, id)?;
        let now = now_epoch_ms().max(entry.created_at);
        entry
            .mark_completed(now)
            .map_err(JournalServiceError::Conflict)?;

        match self.repo.complete_entry(id, now)? {
            WriteOutcome::Applied => {
                info!("event=entry_complete module=journal status=ok entry_id={id}");
                Ok(entry)
            }
            WriteOutcome::Unchanged => Err(JournalServiceError::Conflict(
                EntryTransitionError::AlreadyCompleted,
            )),
        }
    }

    /// Turns a log/todo entry into a habit and records its companion habit.
    ///
    /// Returns the requester's full live habit list.
    pub fn habitize_entry(
        &mut self,
        requester: &Requester,
        id: EntryId,
    ) -> Result<Vec<Habit>, JournalServiceError> {
        let mut entry = self.get_entry(requester, id)?;
        let companion = Habit::from_entry(&entry);
        entry
            .habitize(companion.created_at.max(entry.created_at))
            .map_err(JournalServiceError::Conflict)?;

        match self.repo.habitize_entry(id, &companion)? {
            WriteOutcome::Applied => {}
            WriteOutcome::Unchanged => {
                return Err(JournalServiceError::Conflict(
                    EntryTransitionError::AlreadyHabit,
                ))
            }
        }

        self.list_habits(requester)
    }

    /// Soft-deletes an entry. Its companion habit, if any, is kept.
    pub fn delete_entry(
        &self,
        requester: &Requester,
        id: EntryId,
    ) -> Result<(), JournalServiceError> {
        let entry = self.get_entry(requester, id)?;
        let now = now_epoch_ms().max(entry.created_at);
        match self.repo.soft_delete_entry(id, now)? {
            WriteOutcome::Applied => {
                info!("event=entry_delete module=journal status=ok entry_id={id}");
                Ok(())
            }
            WriteOutcome::Unchanged => Err(JournalServiceError::NotFound(id)),
        }
    }

    /// Lists the requester's live habits, newest first.
    pub fn list_habits(&self, requester: &Requester) -> Result<Vec<Habit>, JournalServiceError> {
        Ok(self
            .repo
            .list_habits(&HabitListQuery::for_owner(requester.user_id))?)
    }

    /// Soft-deletes a habit. The source entry is untouched.
    pub fn delete_habit(
        &self,
        requester: &Requester,
        id: HabitId,
    ) -> Result<(), JournalServiceError> {
        let habit = self
            .repo
            .get_habit(id, false)?
            .filter(|habit| requester.can_access(habit.owner))
            .ok_or(JournalServiceError::NotFound(id))?;

        let now = now_epoch_ms().max(habit.created_at);
        match self.repo.soft_delete_habit(id, now)? {
            WriteOutcome::Applied => {
                info!("event=habit_delete module=journal status=ok habit_id={id}");
                Ok(())
            }
            WriteOutcome::Unchanged => Err(JournalServiceError::NotFound(id)),
        }
    }
}

/// Dispatches creation checks by entry kind.
pub fn validate_create_request(request: &CreateEntryRequest) -> Result<(), JournalServiceError> {
    if request.text.trim().is_empty() {
        return Err(JournalServiceError::validation(
            "text",
            "This field may not be blank.",
        ));
    }

    match request.kind {
        EntryKind::Log => validate_log(request),
        EntryKind::Todo => validate_todo(request),
        EntryKind::Habit => validate_habit(request),
    }
}

fn validate_log(_request: &CreateEntryRequest) -> Result<(), JournalServiceError> {
    Ok(())
}

fn validate_todo(request: &CreateEntryRequest) -> Result<(), JournalServiceError> {
    if request.scheduled_for.is_none() {
        return Err(JournalServiceError::validation(
            "scheduled_for",
            "Scheduled time is required for todo type",
        ));
    }
    Ok(())
}

fn validate_habit(_request: &CreateEntryRequest) -> Result<(), JournalServiceError> {
    Ok(())
}

/// Caps an explicit page size at `ENTRIES_LIMIT_MAX`; no limit means every row.
pub fn normalize_entry_limit(limit: Option<u32>) -> Option<u32> {
    match limit {
        Some(0) | None => None,
        Some(value) => Some(value.min(ENTRIES_LIMIT_MAX)),
    }
}

/// `[start, end)` of a UTC calendar day in epoch ms.
fn utc_day_bounds(date: NaiveDate) -> Result<(i64, i64), JournalServiceError> {
    let out_of_range = || JournalServiceError::validation("date", "Date is out of range.");
    let start = date.and_hms_opt(0, 0, 0).ok_or_else(out_of_range)?;
    let end = date
        .checked_add_days(Days::new(1))
        .and_then(|next| next.and_hms_opt(0, 0, 0))
        .ok_or_else(out_of_range)?;
    Ok((
        start.and_utc().timestamp_millis(),
        end.and_utc().timestamp_millis(),
    ))
}
