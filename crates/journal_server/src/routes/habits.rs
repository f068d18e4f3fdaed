use crate::error::ApiError;
use crate::extract::{CurrentUser, PathId};
use crate::state::AppState;
use crate::wire::{habit_list, HabitResponse};
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use journal_core::{JournalService, SqliteJournalRepository};

/// GET /habits
pub async fn list_habits(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Vec<HabitResponse>>, ApiError> {
    let requester = user.as_requester();
    let habits = state
        .with_db(move |conn, _| {
            let service = JournalService::new(SqliteJournalRepository::try_new(conn)?);
            Ok(service.list_habits(&requester)?)
        })
        .await?;
    Ok(Json(habit_list(&habits)))
}

/// DELETE /habits/:id
pub async fn delete_habit(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    PathId(id): PathId,
) -> Result<StatusCode, ApiError> {
    let requester = user.as_requester();
    state
        .with_db(move |conn, _| {
            let service = JournalService::new(SqliteJournalRepository::try_new(conn)?);
            Ok(service.delete_habit(&requester, id)?)
        })
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
