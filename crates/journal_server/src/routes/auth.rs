//! Token issuing, rotation and revocation.
//!
//! Tokens are returned in the body and mirrored into `HttpOnly` cookies so
//! browser clients never need to store them.

use super::account_service;
use crate::error::ApiError;
use crate::extract::{cookie_value, ACCESS_COOKIE, REFRESH_COOKIE};
use crate::state::AppState;
use crate::wire::{
    AccessResponse, LoginBody, LoginResponse, MessageResponse, RefreshBody, SignupBody,
    SignupResponse, TokensResponse, UserResponse, VerifyBody,
};
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::header::{AUTHORIZATION, SET_COOKIE};
use axum::http::{HeaderMap, HeaderName, StatusCode};
use axum::response::{AppendHeaders, IntoResponse, Response};
use axum::Json;
use journal_core::{AccountServiceError, TokenPair};
use serde_json::json;
use std::time::Duration;

/// POST /auth/signup
pub async fn signup(
    State(state): State<AppState>,
    body: Result<Json<SignupBody>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(body) = body?;
    let (user, pair) = state
        .with_db(move |conn, tokens| Ok(account_service(conn, tokens)?.signup(body.into())?))
        .await?;

    let body = SignupResponse {
        user: UserResponse::from(&user),
        tokens: TokensResponse::from(&pair),
    };
    Ok((
        StatusCode::CREATED,
        AppendHeaders(token_cookies(&state, &pair)),
        Json(body),
    )
        .into_response())
}

/// POST /auth/login
pub async fn login(
    State(state): State<AppState>,
    body: Result<Json<LoginBody>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(body) = body?;
    let (user, pair) = state
        .with_db(move |conn, tokens| {
            Ok(account_service(conn, tokens)?.login(&body.email, &body.password)?)
        })
        .await?;

    let [access_cookie, refresh_cookie] = token_cookies(&state, &pair);
    let headers = [
        access_cookie,
        refresh_cookie,
        (AUTHORIZATION, format!("Bearer {}", pair.access)),
    ];
    let body = LoginResponse {
        access: pair.access,
        refresh: pair.refresh,
        user: UserResponse::from(&user),
    };
    Ok((StatusCode::OK, AppendHeaders(headers), Json(body)).into_response())
}

/// POST /auth/refresh; token from the body, else the `refresh_token` cookie.
pub async fn refresh(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Option<Json<RefreshBody>>,
) -> Result<Response, ApiError> {
    let token = body
        .and_then(|Json(body)| body.refresh)
        .filter(|token| !token.is_empty())
        .or_else(|| cookie_value(&headers, REFRESH_COOKIE))
        .ok_or_else(|| ApiError::validation("refresh", "This field is required."))?;

    let access = state
        .with_db(move |conn, tokens| Ok(account_service(conn, tokens)?.refresh(&token)?))
        .await?;

    let cookie = auth_cookie(
        ACCESS_COOKIE,
        &access,
        state.tokens.access_lifetime(),
        state.cookies.secure,
    );
    Ok((
        StatusCode::OK,
        AppendHeaders([(SET_COOKIE, cookie)]),
        Json(AccessResponse { access }),
    )
        .into_response())
}

/// POST /auth/logout; blacklists the refresh token and clears both cookies.
pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Option<Json<RefreshBody>>,
) -> Result<Response, ApiError> {
    let token = cookie_value(&headers, REFRESH_COOKIE).or_else(|| {
        body.and_then(|Json(body)| body.refresh)
            .filter(|token| !token.is_empty())
    });

    if let Some(token) = token {
        let revoked = state
            .with_db(move |conn, tokens| {
                match account_service(conn, tokens)?.logout(&token) {
                    Ok(()) => Ok(true),
                    Err(AccountServiceError::Unauthenticated(_)) => Ok(false),
                    Err(err) => Err(err.into()),
                }
            })
            .await?;
        if !revoked {
            return Ok((
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": "Invalid token" })),
            )
                .into_response());
        }
    }

    let secure = state.cookies.secure;
    Ok((
        StatusCode::OK,
        AppendHeaders([
            (SET_COOKIE, expired_cookie(ACCESS_COOKIE, secure)),
            (SET_COOKIE, expired_cookie(REFRESH_COOKIE, secure)),
        ]),
        Json(MessageResponse {
            message: "Successfully logged out.",
        }),
    )
        .into_response())
}

/// POST /auth/verify
pub async fn verify(
    State(state): State<AppState>,
    body: Result<Json<VerifyBody>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(body) = body?;
    state
        .with_db(move |conn, tokens| {
            account_service(conn, tokens)?.verify_access(&body.token)?;
            Ok(())
        })
        .await?;
    Ok((StatusCode::OK, Json(json!({}))).into_response())
}

fn token_cookies(state: &AppState, pair: &TokenPair) -> [(HeaderName, String); 2] {
    let secure = state.cookies.secure;
    [
        (
            SET_COOKIE,
            auth_cookie(
                ACCESS_COOKIE,
                &pair.access,
                state.tokens.access_lifetime(),
                secure,
            ),
        ),
        (
            SET_COOKIE,
            auth_cookie(
                REFRESH_COOKIE,
                &pair.refresh,
                state.tokens.refresh_lifetime(),
                secure,
            ),
        ),
    ]
}

fn auth_cookie(name: &str, value: &str, max_age: Duration, secure: bool) -> String {
    let mut cookie = format!(
        "{name}={value}; HttpOnly; SameSite=Lax; Path=/; Max-Age={}",
        max_age.as_secs()
    );
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

fn expired_cookie(name: &str, secure: bool) -> String {
    auth_cookie(name, "", Duration::ZERO, secure)
}
