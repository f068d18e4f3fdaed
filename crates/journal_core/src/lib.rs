//! Core domain logic for the journal backend.
//! This crate is the single source of truth for business invariants.

pub mod auth;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use auth::jwt::{bearer_token, Claims, TokenPair, TokenService, TokenType};
pub use auth::AuthError;
pub use db::{open_db, open_db_in_memory, DbError};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::entry::{EntryId, EntryKind, EntryTransitionError, JournalEntry};
pub use model::habit::{Habit, HabitId};
pub use model::user::{Requester, User, UserId};
pub use repo::account_repo::{SqliteAccountRepository, TokenBlacklist, UserRepository};
pub use repo::journal_repo::{
    EntryListQuery, HabitListQuery, JournalRepository, SqliteJournalRepository,
};
pub use repo::{RepoError, RepoResult, WriteOutcome};
pub use service::account_service::{
    AccountService, AccountServiceError, ProfileUpdate, SignupRequest,
};
pub use service::journal_service::{
    CreateEntryRequest, EntryFilter, JournalService, JournalServiceError,
};

