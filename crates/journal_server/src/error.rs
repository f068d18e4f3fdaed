//! HTTP error mapping.
//!
//! Every failure leaves the server as `{"detail": ...}`; validation failures
//! also name the offending `field`. Internal failures are logged and reported
//! with a generic message.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use journal_core::{AccountServiceError, JournalServiceError, RepoError};
use log::error;
use serde_json::json;
use std::fmt::Display;

const INTERNAL_DETAIL: &str = "Internal server error.";
const NOT_FOUND_DETAIL: &str = "Not found.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub status: StatusCode,
    pub detail: String,
    pub field: Option<&'static str>,
}

impl ApiError {
    pub fn new(status: StatusCode, detail: impl Into<String>) -> Self {
        Self {
            status,
            detail: detail.into(),
            field: None,
        }
    }

    pub fn validation(field: &'static str, detail: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            detail: detail.into(),
            field: Some(field),
        }
    }

    pub fn bad_request(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, detail)
    }

    pub fn not_found() -> Self {
        Self::new(StatusCode::NOT_FOUND, NOT_FOUND_DETAIL)
    }

    pub fn unauthenticated(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, detail)
    }

    pub fn forbidden(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, detail)
    }

    /// Logs `err` and hides it behind a generic 500.
    pub fn internal(err: impl Display) -> Self {
        error!("event=http_error module=server status=error error={err}");
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_DETAIL)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = match self.field {
            Some(field) => json!({ "detail": self.detail, "field": field }),
            None => json!({ "detail": self.detail }),
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<JournalServiceError> for ApiError {
    fn from(value: JournalServiceError) -> Self {
        match value {
            JournalServiceError::Validation { field, message } => Self::validation(field, message),
            JournalServiceError::NotFound(_) => Self::not_found(),
            JournalServiceError::Conflict(err) => Self::bad_request(err.to_string()),
            JournalServiceError::Repo(err) => Self::internal(err),
        }
    }
}

impl From<AccountServiceError> for ApiError {
    fn from(value: AccountServiceError) -> Self {
        match value {
            AccountServiceError::Validation { field, message } => Self::validation(field, message),
            AccountServiceError::EmailTaken => Self::validation("email", value.to_string()),
            AccountServiceError::InvalidCredentials | AccountServiceError::Unauthenticated(_) => {
                Self::unauthenticated(value.to_string())
            }
            AccountServiceError::Forbidden => Self::forbidden(value.to_string()),
            AccountServiceError::NotFound(_) => Self::not_found(),
            AccountServiceError::Auth(err) => Self::internal(err),
            AccountServiceError::Repo(err) => Self::internal(err),
        }
    }
}

impl From<RepoError> for ApiError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound(_) => Self::not_found(),
            other => Self::internal(other),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(value: JsonRejection) -> Self {
        Self::bad_request(value.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(value: QueryRejection) -> Self {
        Self::bad_request(value.body_text())
    }
}
