//! JSON request and response shapes.
//!
//! Timestamps are epoch milliseconds inside the core and RFC 3339 (UTC,
//! millisecond precision) on the wire.

use crate::error::ApiError;
use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use journal_core::{
    CreateEntryRequest, EntryFilter, EntryKind, Habit, JournalEntry, ProfileUpdate, SignupRequest,
    TokenPair, User,
};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt::Display;
use std::str::FromStr;
use uuid::Uuid;

const DATETIME_FORMAT_HINT: &str = "Datetime has wrong format. Use one of these formats instead: \
     YYYY-MM-DDThh:mm[:ss[.uuuuuu]][+HH:MM|-HH:MM|Z].";
const NAIVE_DATETIME_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"];

pub fn rfc3339(epoch_ms: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(epoch_ms)
        .unwrap_or_default()
        .to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[derive(Debug, Deserialize)]
pub struct CreateEntryBody {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default, rename = "type", alias = "kind")]
    pub kind: EntryKind,
    #[serde(default)]
    pub scheduled_for: Option<String>,
}

impl TryFrom<CreateEntryBody> for CreateEntryRequest {
    type Error = ApiError;

    fn try_from(value: CreateEntryBody) -> Result<Self, Self::Error> {
        let scheduled_for = value
            .scheduled_for
            .as_deref()
            .map(|raw| {
                parse_instant(raw)
                    .ok_or_else(|| ApiError::validation("scheduled_for", DATETIME_FORMAT_HINT))
            })
            .transpose()?;

        Ok(Self {
            text: value.text.unwrap_or_default(),
            kind: value.kind,
            scheduled_for,
        })
    }
}

/// Parses an RFC 3339 instant into epoch ms. Offset-less input is read as UTC.
pub fn parse_instant(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
        return Some(at.timestamp_millis());
    }
    NAIVE_DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .map(|at| at.and_utc().timestamp_millis())
}

#[derive(Debug, Default, Deserialize)]
pub struct ListEntriesQuery {
    #[serde(default, deserialize_with = "empty_as_none")]
    pub date: Option<NaiveDate>,
    #[serde(
        default,
        rename = "type",
        alias = "kind",
        deserialize_with = "empty_as_none"
    )]
    pub kind: Option<EntryKind>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl From<ListEntriesQuery> for EntryFilter {
    fn from(value: ListEntriesQuery) -> Self {
        Self {
            date: value.date,
            kind: value.kind,
            limit: value.limit,
            offset: value.offset.unwrap_or(0),
        }
    }
}

/// Blank query values mean "no filter"; anything else must parse.
fn empty_as_none<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
    T::Err: Display,
{
    match Option::<String>::deserialize(deserializer)? {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(serde::de::Error::custom),
        _ => Ok(None),
    }
}

#[derive(Debug, Serialize)]
pub struct EntryResponse {
    pub id: Uuid,
    pub text: String,
    #[serde(rename = "type")]
    pub kind: EntryKind,
    pub scheduled_for: Option<String>,
    pub completed_at: Option<String>,
    pub created_at: String,
}

impl From<&JournalEntry> for EntryResponse {
    fn from(entry: &JournalEntry) -> Self {
        Self {
            id: entry.id,
            text: entry.text.clone(),
            kind: entry.kind,
            scheduled_for: entry.scheduled_for.map(rfc3339),
            completed_at: entry.completed_at.map(rfc3339),
            created_at: rfc3339(entry.created_at),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HabitResponse {
    pub id: Uuid,
    pub text: String,
    pub source_entry: Option<Uuid>,
    pub created_at: String,
}

impl From<&Habit> for HabitResponse {
    fn from(habit: &Habit) -> Self {
        Self {
            id: habit.id,
            text: habit.text.clone(),
            source_entry: habit.source_entry,
            created_at: rfc3339(habit.created_at),
        }
    }
}

pub fn habit_list(habits: &[Habit]) -> Vec<HabitResponse> {
    habits.iter().map(HabitResponse::from).collect()
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub full_name: String,
    pub phone_number: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub is_active: bool,
    pub is_staff: bool,
    pub date_joined: String,
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            full_name: user.full_name(),
            phone_number: user.phone_number.clone(),
            date_of_birth: user.date_of_birth,
            is_active: user.is_active,
            is_staff: user.is_staff,
            date_joined: rfc3339(user.created_at),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SignupBody {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
}

impl From<SignupBody> for SignupRequest {
    fn from(value: SignupBody) -> Self {
        Self {
            email: value.email,
            password: value.password,
            first_name: value.first_name,
            last_name: value.last_name,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginBody {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct RefreshBody {
    #[serde(default)]
    pub refresh: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct VerifyBody {
    pub token: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ProfilePatchBody {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone_number: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
}

impl From<ProfilePatchBody> for ProfileUpdate {
    fn from(value: ProfilePatchBody) -> Self {
        Self {
            first_name: value.first_name,
            last_name: value.last_name,
            phone_number: value.phone_number,
            date_of_birth: value.date_of_birth,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TokensResponse {
    pub access: String,
    pub refresh: String,
}

impl From<&TokenPair> for TokensResponse {
    fn from(pair: &TokenPair) -> Self {
        Self {
            access: pair.access.clone(),
            refresh: pair.refresh.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub access: String,
    pub refresh: String,
    pub user: UserResponse,
}

#[derive(Debug, Serialize)]
pub struct SignupResponse {
    pub user: UserResponse,
    pub tokens: TokensResponse,
}

#[derive(Debug, Serialize)]
pub struct AccessResponse {
    pub access: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}
