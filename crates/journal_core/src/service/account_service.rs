//! Account and session use-case service.
//!
//! # Responsibility
//! - Sign up, authenticate and resolve accounts from access tokens.
//! - Rotate access tokens from refresh tokens and blacklist refresh tokens
//!   on logout.
//! - Profile edits and (de)activation under the same-user-or-staff rule.
//!
//! # Invariants
//! - Inactive accounts can neither log in nor use previously issued tokens.
//! - A blacklisted refresh token is never accepted again.

use crate::auth::jwt::{Claims, TokenPair, TokenService, TokenType};
use crate::auth::password::{hash_password, verify_password, MIN_PASSWORD_CHARS};
use crate::auth::AuthError;
use crate::model::now_epoch_ms;
use crate::model::user::{normalize_email, Requester, User, UserId, PHONE_NUMBER_MAX_CHARS};
use crate::repo::account_repo::{TokenBlacklist, UserRepository};
use crate::repo::RepoError;
use chrono::NaiveDate;
use log::{info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};

const INVALID_CREDENTIALS: &str = "No active account found with the given credentials";

/// Service error for account use-cases.
#[derive(Debug)]
pub enum AccountServiceError {
    Validation {
        field: &'static str,
        message: String,
    },
    EmailTaken,
    /// Login failed; deliberately does not say which part was wrong.
    InvalidCredentials,
    /// Token missing, invalid, expired, revoked, or bound to an unusable account.
    Unauthenticated(String),
    /// Requester may not act on the target account.
    Forbidden,
    NotFound(UserId),
    Auth(AuthError),
    Repo(RepoError),
}

impl AccountServiceError {
    fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: message.into(),
        }
    }
}

impl Display for AccountServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation { field, message } => write!(f, "{field}: {message}"),
            Self::EmailTaken => write!(f, "user with this email address already exists."),
            Self::InvalidCredentials => write!(f, "{INVALID_CREDENTIALS}"),
            Self::Unauthenticated(reason) => write!(f, "{reason}"),
            Self::Forbidden => write!(f, "You do not have permission to perform this action."),
            Self::NotFound(_) => write!(f, "Not found."),
            Self::Auth(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for AccountServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Auth(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for AccountServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::Duplicate("users.email") => Self::EmailTaken,
            RepoError::NotFound(id) => Self::NotFound(id),
            other => Self::Repo(other),
        }
    }
}

impl From<AuthError> for AccountServiceError {
    fn from(value: AuthError) -> Self {
        match value {
            AuthError::InvalidToken(reason) => Self::Unauthenticated(reason.to_string()),
            AuthError::WrongTokenType => Self::Unauthenticated(value.to_string()),
            other => Self::Auth(other),
        }
    }
}

/// Input for account registration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

/// Partial profile update; `None` leaves a field unchanged, an empty string clears it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone_number: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
}

/// Account service facade over repository implementations.
pub struct AccountService<R: UserRepository + TokenBlacklist> {
    repo: R,
    tokens: TokenService,
}

impl<R: UserRepository + TokenBlacklist> AccountService<R> {
    pub fn new(repo: R, tokens: TokenService) -> Self {
        Self { repo, tokens }
    }

    /// Registers a regular account and issues its first token pair.
    pub fn signup(&self, request: SignupRequest) -> Result<(User, TokenPair), AccountServiceError> {
        let user = self.register(request, false)?;
        let pair = self.tokens.issue_pair(&user)?;
        Ok((user, pair))
    }

    /// Registers an administrator account.
    pub fn create_superuser(
        &self,
        email: &str,
        password: &str,
    ) -> Result<User, AccountServiceError> {
        self.register(
            SignupRequest {
                email: email.to_string(),
                password: password.to_string(),
                ..SignupRequest::default()
            },
            true,
        )
    }

    /// Registers an account on behalf of staff. No tokens are issued.
    pub fn create_user(
        &self,
        requester: &Requester,
        request: SignupRequest,
    ) -> Result<User, AccountServiceError> {
        if !requester.is_staff {
            return Err(AccountServiceError::Forbidden);
        }
        self.register(request, false)
    }

    /// Lists every account; staff only.
    pub fn list_users(&self, requester: &Requester) -> Result<Vec<User>, AccountServiceError> {
        if !requester.is_staff {
            return Err(AccountServiceError::Forbidden);
        }
        Ok(self.repo.list_users()?)
    }

    /// Checks credentials and issues a token pair.
    pub fn login(
        &self,
        email: &str,
        password: &str,
    ) -> Result<(User, TokenPair), AccountServiceError> {
        let user = self.authenticate(email, password)?;
        let pair = self.tokens.issue_pair(&user)?;
        info!("event=auth_login module=account status=ok user_id={}", user.id);
        Ok((user, pair))
    }

    /// Returns the active account matching `email` and `password`.
    pub fn authenticate(
        &self,
        email: &str,
        password: &str,
    ) -> Result<User, AccountServiceError> {
        let Some(email) = normalize_email(email) else {
            return Err(AccountServiceError::InvalidCredentials);
        };
        let Some(user) = self.repo.find_user_by_email(&email)? else {
            return Err(AccountServiceError::InvalidCredentials);
        };
        if !user.is_active || !verify_password(password, &user.password_hash)? {
            warn!("event=auth_login module=account status=error error_code=invalid_credentials");
            return Err(AccountServiceError::InvalidCredentials);
        }
        Ok(user)
    }

    /// Issues a new access token from a live, non-revoked refresh token.
    pub fn refresh(&self, refresh_token: &str) -> Result<String, AccountServiceError> {
        let claims = self.live_refresh_claims(refresh_token)?;
        let user = self.active_user_for(&claims)?;
        Ok(self.tokens.issue(&user, TokenType::Access)?)
    }

    /// Blacklists a refresh token.
    pub fn logout(&self, refresh_token: &str) -> Result<(), AccountServiceError> {
        let claims = self.tokens.verify(refresh_token, TokenType::Refresh)?;
        let user_id = claims.user_id()?;
        self.repo.revoke_token(
            &claims.jti,
            user_id,
            claims.exp.saturating_mul(1000),
            now_epoch_ms(),
        )?;
        info!("event=auth_logout module=account status=ok user_id={user_id}");
        Ok(())
    }

    /// Verifies an access token without touching storage.
    pub fn verify_access(&self, token: &str) -> Result<Claims, AccountServiceError> {
        Ok(self.tokens.verify(token, TokenType::Access)?)
    }

    /// Resolves the active account behind an access token.
    pub fn resolve_requester(&self, access_token: &str) -> Result<User, AccountServiceError> {
        let claims = self.tokens.verify(access_token, TokenType::Access)?;
        self.active_user_for(&claims)
    }

    /// Loads an account visible to the requester.
    pub fn get_user(
        &self,
        requester: &Requester,
        id: UserId,
    ) -> Result<User, AccountServiceError> {
        let user = self
            .repo
            .get_user(id)?
            .ok_or(AccountServiceError::NotFound(id))?;
        if !requester.can_access(user.id) {
            return Err(AccountServiceError::Forbidden);
        }
        Ok(user)
    }

    /// Applies a partial profile update.
    pub fn update_profile(
        &self,
        requester: &Requester,
        id: UserId,
        update: ProfileUpdate,
    ) -> Result<User, AccountServiceError> {
        let mut user = self.get_user(requester, id)?;

        if let Some(value) = update.first_name {
            user.first_name = non_empty(value);
        }
        if let Some(value) = update.last_name {
            user.last_name = non_empty(value);
        }
        if let Some(value) = update.phone_number {
            if value.trim().chars().count() > PHONE_NUMBER_MAX_CHARS {
                return Err(AccountServiceError::validation(
                    "phone_number",
                    "Ensure this field has no more than 15 characters.",
                ));
            }
            user.phone_number = non_empty(value);
        }
        if let Some(value) = update.date_of_birth {
            user.date_of_birth = Some(value);
        }

        user.updated_at = now_epoch_ms();
        self.repo.update_user(&user)?;
        Ok(user)
    }

    /// Activates or deactivates an account.
    pub fn set_active(
        &self,
        requester: &Requester,
        id: UserId,
        active: bool,
    ) -> Result<User, AccountServiceError> {
        let mut user = self.get_user(requester, id)?;
        user.is_active = active;
        user.updated_at = now_epoch_ms();
        self.repo.update_user(&user)?;
        info!(
            "event=user_set_active module=account status=ok user_id={} active={active}",
            user.id
        );
        Ok(user)
    }

    /// Drops blacklist rows for tokens that have expired on their own.
    pub fn purge_expired_tokens(&self) -> Result<usize, AccountServiceError> {
        Ok(self.repo.purge_expired_tokens(now_epoch_ms())?)
    }

    fn register(
        &self,
        request: SignupRequest,
        is_staff: bool,
    ) -> Result<User, AccountServiceError> {
        let email = normalize_email(&request.email).ok_or_else(|| {
            AccountServiceError::validation("email", "Enter a valid email address.")
        })?;
        if request.password.chars().count() < MIN_PASSWORD_CHARS {
            return Err(AccountServiceError::validation(
                "password",
                "This password is too short. It must contain at least 8 characters.",
            ));
        }

        let mut user = User::new(email, hash_password(&request.password)?);
        user.first_name = request.first_name.and_then(non_empty);
        user.last_name = request.last_name.and_then(non_empty);
        user.is_staff = is_staff;
        self.repo.create_user(&user)?;

        info!(
            "event=user_signup module=account status=ok user_id={} is_staff={is_staff}",
            user.id
        );
        Ok(user)
    }

    fn live_refresh_claims(&self, token: &str) -> Result<Claims, AccountServiceError> {
        let claims = self.tokens.verify(token, TokenType::Refresh)?;
        if self.repo.is_token_revoked(&claims.jti)? {
            return Err(AccountServiceError::Unauthenticated(
                "Token is blacklisted".to_string(),
            ));
        }
        Ok(claims)
    }

    fn active_user_for(&self, claims: &Claims) -> Result<User, AccountServiceError> {
        let user_id = claims.user_id()?;
        match self.repo.get_user(user_id)? {
            Some(user) if user.is_active => Ok(user),
            Some(_) => Err(AccountServiceError::Unauthenticated(
                "User is inactive".to_string(),
            )),
            None => Err(AccountServiceError::Unauthenticated(
                "User not found".to_string(),
            )),
        }
    }
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
