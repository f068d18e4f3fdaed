//! Account repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist user accounts (`users`).
//! - Persist the refresh-token blacklist (`revoked_tokens`).
//!
//! # Invariants
//! - Emails are unique case-insensitively; a clash surfaces as
//!   `RepoError::Duplicate("users.email")`.
//! - Revoking the same token twice is a no-op.

use crate::model::user::{User, UserId};
use crate::repo::support::{
    bool_to_int, ensure_table_ready, int_to_bool, map_unique_violation, parse_uuid,
};
use crate::repo::{RepoError, RepoResult};
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, Row};

const USER_SELECT_SQL: &str = "SELECT
    id,
    email,
    password_hash,
    first_name,
    last_name,
    phone_number,
    date_of_birth,
    is_active,
    is_staff,
    created_at,
    updated_at
FROM users";

const USER_COLUMNS: &[&str] = &[
    "id",
    "email",
    "password_hash",
    "first_name",
    "last_name",
    "phone_number",
    "date_of_birth",
    "is_active",
    "is_staff",
    "created_at",
    "updated_at",
];

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Repository interface for user accounts.
pub trait UserRepository {
    fn create_user(&self, user: &User) -> RepoResult<()>;
    fn get_user(&self, id: UserId) -> RepoResult<Option<User>>;
    /// Looks up by normalized email.
    fn find_user_by_email(&self, email: &str) -> RepoResult<Option<User>>;
    /// All accounts, oldest first.
    fn list_users(&self) -> RepoResult<Vec<User>>;
    /// Replaces mutable profile/flag columns of an existing account.
    fn update_user(&self, user: &User) -> RepoResult<()>;
}

/// Repository interface for revoked refresh tokens.
pub trait TokenBlacklist {
    fn revoke_token(
        &self,
        jti: &str,
        user_id: UserId,
        expires_at: i64,
        revoked_at: i64,
    ) -> RepoResult<()>;
    fn is_token_revoked(&self, jti: &str) -> RepoResult<bool>;
    /// Drops blacklist rows whose token has expired anyway. Returns removed count.
    fn purge_expired_tokens(&self, now: i64) -> RepoResult<usize>;
}

/// SQLite-backed account repository.
pub struct SqliteAccountRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteAccountRepository<'conn> {
    /// Constructs a repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_table_ready(conn, "users", USER_COLUMNS)?;
        ensure_table_ready(conn, "revoked_tokens", &["jti", "user_id", "expires_at"])?;
        Ok(Self { conn })
    }
}

impl UserRepository for SqliteAccountRepository<'_> {
    fn create_user(&self, user: &User) -> RepoResult<()> {
        user.validate()?;

        self.conn
            .execute(
                "INSERT INTO users (
                    id,
                    email,
                    password_hash,
                    first_name,
                    last_name,
                    phone_number,
                    date_of_birth,
                    is_active,
                    is_staff,
                    created_at,
                    updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11);",
                params![
                    user.id.to_string(),
                    user.email.as_str(),
                    user.password_hash.as_str(),
                    user.first_name.as_deref(),
                    user.last_name.as_deref(),
                    user.phone_number.as_deref(),
                    user.date_of_birth.map(|date| date.format(DATE_FORMAT).to_string()),
                    bool_to_int(user.is_active),
                    bool_to_int(user.is_staff),
                    user.created_at,
                    user.updated_at,
                ],
            )
            .map_err(|err| map_unique_violation(err, "users.email"))?;

        Ok(())
    }

    fn get_user(&self, id: UserId) -> RepoResult<Option<User>> {
        self.conn
            .query_row(
                &format!("{USER_SELECT_SQL} WHERE id = ?1;"),
                [id.to_string()],
                |row| Ok(parse_user_row(row)),
            )
            .optional()?
            .transpose()
    }

    fn find_user_by_email(&self, email: &str) -> RepoResult<Option<User>> {
        self.conn
            .query_row(
                &format!("{USER_SELECT_SQL} WHERE email = ?1 COLLATE NOCASE;"),
                [email],
                |row| Ok(parse_user_row(row)),
            )
            .optional()?
            .transpose()
    }

    fn list_users(&self) -> RepoResult<Vec<User>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{USER_SELECT_SQL} ORDER BY created_at ASC, id ASC;"))?;
        let mut rows = stmt.query([])?;
        let mut users = Vec::new();

        while let Some(row) = rows.next()? {
            users.push(parse_user_row(row)?);
        }
        Ok(users)
    }

    fn update_user(&self, user: &User) -> RepoResult<()> {
        user.validate()?;

        let changed = self
            .conn
            .execute(
                "UPDATE users
                 SET
                    email = ?2,
                    password_hash = ?3,
                    first_name = ?4,
                    last_name = ?5,
                    phone_number = ?6,
                    date_of_birth = ?7,
                    is_active = ?8,
                    is_staff = ?9,
                    updated_at = ?10
                 WHERE id = ?1;",
                params![
                    user.id.to_string(),
                    user.email.as_str(),
                    user.password_hash.as_str(),
                    user.first_name.as_deref(),
                    user.last_name.as_deref(),
                    user.phone_number.as_deref(),
                    user.date_of_birth.map(|date| date.format(DATE_FORMAT).to_string()),
                    bool_to_int(user.is_active),
                    bool_to_int(user.is_staff),
                    user.updated_at,
                ],
            )
            .map_err(|err| map_unique_violation(err, "users.email"))?;

        if changed == 0 {
            return Err(RepoError::NotFound(user.id));
        }

        Ok(())
    }
}

impl TokenBlacklist for SqliteAccountRepository<'_> {
    fn revoke_token(
        &self,
        jti: &str,
        user_id: UserId,
        expires_at: i64,
        revoked_at: i64,
    ) -> RepoResult<()> {
        self.conn.execute(
            "INSERT OR IGNORE INTO revoked_tokens (jti, user_id, expires_at, revoked_at)
             VALUES (?1, ?2, ?3, ?4);",
            params![jti, user_id.to_string(), expires_at, revoked_at],
        )?;
        Ok(())
    }

    fn is_token_revoked(&self, jti: &str) -> RepoResult<bool> {
        let exists: i64 = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM revoked_tokens WHERE jti = ?1);",
            [jti],
            |row| row.get(0),
        )?;
        Ok(exists == 1)
    }

    fn purge_expired_tokens(&self, now: i64) -> RepoResult<usize> {
        let removed = self
            .conn
            .execute("DELETE FROM revoked_tokens WHERE expires_at <= ?1;", [now])?;
        Ok(removed)
    }
}

fn parse_user_row(row: &Row<'_>) -> RepoResult<User> {
    let id_text: String = row.get("id")?;
    let date_of_birth = match row.get::<_, Option<String>>("date_of_birth")? {
        Some(value) => Some(NaiveDate::parse_from_str(&value, DATE_FORMAT).map_err(|_| {
            RepoError::InvalidData(format!("invalid date `{value}` in users.date_of_birth"))
        })?),
        None => None,
    };

    let user = User {
        id: parse_uuid(&id_text, "users.id")?,
        email: row.get("email")?,
        password_hash: row.get("password_hash")?,
        first_name: row.get("first_name")?,
        last_name: row.get("last_name")?,
        phone_number: row.get("phone_number")?,
        date_of_birth,
        is_active: int_to_bool(row.get("is_active")?, "users.is_active")?,
        is_staff: int_to_bool(row.get("is_staff")?, "users.is_staff")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    };
    user.validate()?;
    Ok(user)
}
