//! Account profile handlers. Callers reach their own account; staff reach any.

use super::account_service;
use crate::error::ApiError;
use crate::extract::{CurrentUser, PathId};
use crate::state::AppState;
use crate::wire::{MessageResponse, ProfilePatchBody, SignupBody, UserResponse};
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use journal_core::{Requester, UserId};

/// GET /users; staff only.
pub async fn list_users(
    State(state): State<AppState>,
    CurrentUser(requester): CurrentUser,
) -> Result<Json<Vec<UserResponse>>, ApiError> {
    let requester = requester.as_requester();
    let users = state
        .with_db(move |conn, tokens| Ok(account_service(conn, tokens)?.list_users(&requester)?))
        .await?;
    Ok(Json(users.iter().map(UserResponse::from).collect()))
}

/// POST /users; staff only. Self-service registration lives at /auth/signup.
pub async fn create_user(
    State(state): State<AppState>,
    CurrentUser(requester): CurrentUser,
    body: Result<Json<SignupBody>, JsonRejection>,
) -> Result<(StatusCode, Json<UserResponse>), ApiError> {
    let Json(body) = body?;
    let requester = requester.as_requester();
    let user = state
        .with_db(move |conn, tokens| {
            Ok(account_service(conn, tokens)?.create_user(&requester, body.into())?)
        })
        .await?;
    Ok((StatusCode::CREATED, Json(UserResponse::from(&user))))
}

/// GET /users/me
pub async fn me(CurrentUser(user): CurrentUser) -> Json<UserResponse> {
    Json(UserResponse::from(&user))
}

/// GET /users/:id
pub async fn get_user(
    State(state): State<AppState>,
    CurrentUser(requester): CurrentUser,
    PathId(id): PathId,
) -> Result<Json<UserResponse>, ApiError> {
    let requester = requester.as_requester();
    let user = state
        .with_db(move |conn, tokens| Ok(account_service(conn, tokens)?.get_user(&requester, id)?))
        .await?;
    Ok(Json(UserResponse::from(&user)))
}

/// PATCH /users/:id
pub async fn update_user(
    State(state): State<AppState>,
    CurrentUser(requester): CurrentUser,
    PathId(id): PathId,
    body: Result<Json<ProfilePatchBody>, JsonRejection>,
) -> Result<Json<UserResponse>, ApiError> {
    let Json(body) = body?;
    let requester = requester.as_requester();
    let user = state
        .with_db(move |conn, tokens| {
            Ok(account_service(conn, tokens)?.update_profile(&requester, id, body.into())?)
        })
        .await?;
    Ok(Json(UserResponse::from(&user)))
}

/// POST /users/:id/activate
pub async fn activate(
    State(state): State<AppState>,
    CurrentUser(requester): CurrentUser,
    PathId(id): PathId,
) -> Result<Json<MessageResponse>, ApiError> {
    set_active(&state, requester.as_requester(), id, true).await?;
    Ok(Json(MessageResponse {
        message: "User activated successfully",
    }))
}

/// POST /users/:id/deactivate
pub async fn deactivate(
    State(state): State<AppState>,
    CurrentUser(requester): CurrentUser,
    PathId(id): PathId,
) -> Result<Json<MessageResponse>, ApiError> {
    set_active(&state, requester.as_requester(), id, false).await?;
    Ok(Json(MessageResponse {
        message: "User deactivated successfully",
    }))
}

async fn set_active(
    state: &AppState,
    requester: Requester,
    id: UserId,
    active: bool,
) -> Result<(), ApiError> {
    state
        .with_db(move |conn, tokens| {
            account_service(conn, tokens)?.set_active(&requester, id, active)?;
            Ok(())
        })
        .await
}
