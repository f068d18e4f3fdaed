//! HTTP routes.

use crate::error::ApiError;
use crate::state::AppState;
use axum::extract::Request;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{delete, get, post};
use axum::Router;
use journal_core::{AccountService, SqliteAccountRepository, TokenService};
use log::info;
use rusqlite::Connection;
use std::time::Instant;

mod auth;
mod entries;
mod habits;
mod health;
mod users;

/// Builds the full application router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route(
            "/entries",
            post(entries::create_entry).get(entries::list_entries),
        )
        .route(
            "/entries/:id",
            get(entries::get_entry).delete(entries::delete_entry),
        )
        .route("/entries/:id/done", post(entries::complete_entry))
        .route("/entries/:id/habitize", post(entries::habitize_entry))
        .route("/habits", get(habits::list_habits))
        .route("/habits/:id", delete(habits::delete_habit))
        .route("/auth/signup", post(auth::signup))
        .route("/auth/login", post(auth::login))
        .route("/auth/refresh", post(auth::refresh))
        .route("/auth/logout", post(auth::logout))
        .route("/auth/verify", post(auth::verify))
        .route("/users", get(users::list_users).post(users::create_user))
        .route("/users/me", get(users::me))
        .route("/users/:id", get(users::get_user).patch(users::update_user))
        .route("/users/:id/activate", post(users::activate))
        .route("/users/:id/deactivate", post(users::deactivate))
        .layer(middleware::from_fn(log_request))
        .with_state(state)
}

async fn log_request(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let started = Instant::now();

    let response = next.run(request).await;

    info!(
        "event=http_request module=server status=ok method={method} path={path} http_status={} duration_ms={}",
        response.status().as_u16(),
        started.elapsed().as_millis()
    );
    response
}

fn account_service<'conn>(
    conn: &'conn Connection,
    tokens: &TokenService,
) -> Result<AccountService<SqliteAccountRepository<'conn>>, ApiError> {
    Ok(AccountService::new(
        SqliteAccountRepository::try_new(conn)?,
        tokens.clone(),
    ))
}
