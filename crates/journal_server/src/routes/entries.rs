//! Journal entry handlers.

use crate::error::ApiError;
use crate::extract::{CurrentUser, PathId};
use crate::state::AppState;
use crate::wire::{habit_list, CreateEntryBody, EntryResponse, HabitResponse, ListEntriesQuery};
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use journal_core::{CreateEntryRequest, EntryFilter, JournalService, SqliteJournalRepository};

/// POST /entries
pub async fn create_entry(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    body: Result<Json<CreateEntryBody>, JsonRejection>,
) -> Result<(StatusCode, Json<EntryResponse>), ApiError> {
    let Json(body) = body?;
    let request = CreateEntryRequest::try_from(body)?;
    let requester = user.as_requester();

    let entry = state
        .with_db(move |conn, _| {
            let mut service = JournalService::new(SqliteJournalRepository::try_new(conn)?);
            Ok(service.create_entry(&requester, request)?)
        })
        .await?;
    Ok((StatusCode::CREATED, Json(EntryResponse::from(&entry))))
}

/// GET /entries?date=&type=&limit=&offset=
pub async fn list_entries(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    query: Result<Query<ListEntriesQuery>, QueryRejection>,
) -> Result<Json<Vec<EntryResponse>>, ApiError> {
    let Query(query) = query?;
    let filter = EntryFilter::from(query);
    let requester = user.as_requester();

    let entries = state
        .with_db(move |conn, _| {
            let service = JournalService::new(SqliteJournalRepository::try_new(conn)?);
            Ok(service.list_entries(&requester, &filter)?)
        })
        .await?;
    Ok(Json(entries.iter().map(EntryResponse::from).collect()))
}

/// GET /entries/:id
pub async fn get_entry(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    PathId(id): PathId,
) -> Result<Json<EntryResponse>, ApiError> {
    let requester = user.as_requester();
    let entry = state
        .with_db(move |conn, _| {
            let service = JournalService::new(SqliteJournalRepository::try_new(conn)?);
            Ok(service.get_entry(&requester, id)?)
        })
        .await?;
    Ok(Json(EntryResponse::from(&entry)))
}

/// DELETE /entries/:id
pub async fn delete_entry(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    PathId(id): PathId,
) -> Result<StatusCode, ApiError> {
    let requester = user.as_requester();
    state
        .with_db(move |conn, _| {
            let service = JournalService::new(SqliteJournalRepository::try_new(conn)?);
            Ok(service.delete_entry(&requester, id)?)
        })
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /entries/:id/done
pub async fn complete_entry(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    PathId(id): PathId,
) -> Result<Json<EntryResponse>, ApiError> {
    let requester = user.as_requester();
    let entry = state
        .with_db(move |conn, _| {
            let service = JournalService::new(SqliteJournalRepository::try_new(conn)?);
            Ok(service.complete_entry(&requester, id)?)
        })
        .await?;
    Ok(Json(EntryResponse::from(&entry)))
}

/// POST /entries/:id/habitize
pub async fn habitize_entry(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    PathId(id): PathId,
) -> Result<(StatusCode, Json<Vec<HabitResponse>>), ApiError> {
    let requester = user.as_requester();
    let habits = state
        .with_db(move |conn, _| {
            let mut service = JournalService::new(SqliteJournalRepository::try_new(conn)?);
            Ok(service.habitize_entry(&requester, id)?)
        })
        .await?;
    Ok((StatusCode::CREATED, Json(habit_list(&habits))))
}
