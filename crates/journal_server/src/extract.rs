//! Request extractors: the authenticated account and path ids.

use crate::error::ApiError;
use crate::state::AppState;
use axum::async_trait;
use axum::extract::{FromRequestParts, Path};
use axum::http::header::{AUTHORIZATION, COOKIE};
use axum::http::request::Parts;
use axum::http::HeaderMap;
use journal_core::{bearer_token, AccountService, SqliteAccountRepository, User};
use uuid::Uuid;

pub const ACCESS_COOKIE: &str = "access_token";
pub const REFRESH_COOKIE: &str = "refresh_token";

/// Active account behind the request's access token.
///
/// The token comes from `Authorization: Bearer`, else the `access_token` cookie.
pub struct CurrentUser(pub User);

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = request_access_token(&parts.headers).ok_or_else(|| {
            ApiError::unauthenticated("Authentication credentials were not provided.")
        })?;

        let user = state
            .with_db(move |conn, tokens| {
                let accounts =
                    AccountService::new(SqliteAccountRepository::try_new(conn)?, tokens.clone());
                Ok(accounts.resolve_requester(&token)?)
            })
            .await?;
        Ok(Self(user))
    }
}

/// UUID path segment; anything unparsable is reported as not found.
pub struct PathId(pub Uuid);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for PathId {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(raw) = Path::<String>::from_request_parts(parts, state)
            .await
            .map_err(|_| ApiError::not_found())?;
        Uuid::parse_str(&raw)
            .map(Self)
            .map_err(|_| ApiError::not_found())
    }
}

pub fn request_access_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(bearer_token)
        .map(str::to_string)
        .or_else(|| cookie_value(headers, ACCESS_COOKIE))
}

/// Returns the first non-empty cookie named `name`.
pub fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|header| header.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, value)| *key == name && !value.is_empty())
        .map(|(_, value)| value.to_string())
}
