//! JWT issuing and verification for access/refresh token pairs.
//!
//! Tokens are HS256-signed. Each token carries a unique `jti` so refresh
//! tokens can be blacklisted on logout.

use crate::auth::AuthError;
use crate::model::user::{User, UserId};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

/// Minimum accepted signing secret length, in bytes.
pub const MIN_SECRET_BYTES: usize = 32;
/// Default access token lifetime.
pub const DEFAULT_ACCESS_LIFETIME: Duration = Duration::from_secs(5 * 60);
/// Default refresh token lifetime.
pub const DEFAULT_REFRESH_LIFETIME: Duration = Duration::from_secs(24 * 60 * 60);

const DEV_SECRET: &str = "journal-dev-secret-not-for-production-0001";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
    Access,
    Refresh,
}

/// Token payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Account id.
    pub sub: String,
    pub email: String,
    pub is_staff: bool,
    pub token_type: TokenType,
    pub jti: String,
    /// Issued at, Unix seconds.
    pub iat: i64,
    /// Expiry, Unix seconds.
    pub exp: i64,
}

impl Claims {
    /// Parses `sub` back into an account id.
    pub fn user_id(&self) -> Result<UserId, AuthError> {
        Uuid::parse_str(&self.sub).map_err(|_| AuthError::InvalidToken("Token subject is invalid"))
    }
}

/// Freshly issued access/refresh pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

/// Signs and verifies tokens with one shared secret.
#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_lifetime: Duration,
    refresh_lifetime: Duration,
}

impl TokenService {
    /// Creates a service; rejects secrets shorter than `MIN_SECRET_BYTES`.
    pub fn new(
        secret: &str,
        access_lifetime: Duration,
        refresh_lifetime: Duration,
    ) -> Result<Self, AuthError> {
        if secret.trim().is_empty() {
            return Err(AuthError::WeakSecret("secret must not be empty"));
        }
        if secret.len() < MIN_SECRET_BYTES {
            return Err(AuthError::WeakSecret("secret must be at least 32 bytes"));
        }
        Ok(Self::from_secret(secret, access_lifetime, refresh_lifetime))
    }

    /// Service with a fixed, public secret for local development and tests.
    pub fn new_dev() -> Self {
        Self::from_secret(DEV_SECRET, DEFAULT_ACCESS_LIFETIME, DEFAULT_REFRESH_LIFETIME)
    }

    /// Replaces both token lifetimes.
    pub fn with_lifetimes(mut self, access_lifetime: Duration, refresh_lifetime: Duration) -> Self {
        self.access_lifetime = access_lifetime;
        self.refresh_lifetime = refresh_lifetime;
        self
    }

    fn from_secret(secret: &str, access_lifetime: Duration, refresh_lifetime: Duration) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            access_lifetime,
            refresh_lifetime,
        }
    }

    pub fn access_lifetime(&self) -> Duration {
        self.access_lifetime
    }

    pub fn refresh_lifetime(&self) -> Duration {
        self.refresh_lifetime
    }

    /// Issues a new access/refresh pair for `user`.
    pub fn issue_pair(&self, user: &User) -> Result<TokenPair, AuthError> {
        Ok(TokenPair {
            access: self.issue(user, TokenType::Access)?,
            refresh: self.issue(user, TokenType::Refresh)?,
        })
    }

    /// Issues a single token of `token_type` for `user`.
    pub fn issue(&self, user: &User, token_type: TokenType) -> Result<String, AuthError> {
        let lifetime = match token_type {
            TokenType::Access => self.access_lifetime,
            TokenType::Refresh => self.refresh_lifetime,
        };
        let now = chrono::Utc::now().timestamp();
        let lifetime_secs = i64::try_from(lifetime.as_secs()).unwrap_or(i64::MAX);
        let claims = Claims {
            sub: user.id.to_string(),
            email: user.email.clone(),
            is_staff: user.is_staff,
            token_type,
            jti: Uuid::new_v4().simple().to_string(),
            iat: now,
            exp: now.saturating_add(lifetime_secs),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(AuthError::Encoding)
    }

    /// Verifies signature, expiry and token type.
    pub fn verify(&self, token: &str, expected: TokenType) -> Result<Claims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        let claims = decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|err| {
                AuthError::InvalidToken(match err.kind() {
                    ErrorKind::ExpiredSignature => "Token is expired",
                    ErrorKind::InvalidSignature => "Token signature is invalid",
                    _ => "Token is invalid",
                })
            })?;

        if claims.token_type != expected {
            return Err(AuthError::WrongTokenType);
        }
        Ok(claims)
    }
}

/// Extracts the token from an `Authorization: Bearer <token>` header value.
pub fn bearer_token(header_value: &str) -> Option<&str> {
    let token = header_value.strip_prefix("Bearer ")?.trim();
    if token.is_empty() || token.contains(' ') {
        None
    } else {
        Some(token)
    }
}
