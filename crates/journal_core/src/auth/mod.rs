//! Authentication primitives.
//!
//! # Responsibility
//! - Hash and verify account passwords (argon2id).
//! - Issue and verify signed access/refresh tokens (HS256 JWT).
//!
//! # Invariants
//! - Secrets, passwords and raw tokens are never logged.
//! - Access tokens are never accepted where a refresh token is required, and
//!   vice versa.

use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod jwt;
pub mod password;

/// Errors from authentication primitives.
#[derive(Debug)]
pub enum AuthError {
    /// Signing secret rejected at construction.
    WeakSecret(&'static str),
    /// Token failed signature, structure or expiry checks.
    InvalidToken(&'static str),
    /// Token kind does not match the expected use.
    WrongTokenType,
    /// Token signing failed.
    Encoding(jsonwebtoken::errors::Error),
    /// Password hashing backend failure.
    PasswordHash(String),
}

impl Display for AuthError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::WeakSecret(reason) => write!(f, "invalid signing secret: {reason}"),
            Self::InvalidToken(reason) => write!(f, "{reason}"),
            Self::WrongTokenType => write!(f, "Token has wrong type"),
            Self::Encoding(err) => write!(f, "failed to sign token: {err}"),
            Self::PasswordHash(message) => write!(f, "password hashing failed: {message}"),
        }
    }
}

impl Error for AuthError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Encoding(err) => Some(err),
            _ => None,
        }
    }
}
