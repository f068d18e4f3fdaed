//! Shared application state.

use crate::error::ApiError;
use journal_core::TokenService;
use rusqlite::Connection;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// One connection; each request holds the lock for its whole unit of work.
    pub db: Arc<Mutex<Connection>>,
    pub tokens: TokenService,
    pub cookies: CookieSettings,
}

/// Attributes applied to auth cookies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CookieSettings {
    pub secure: bool,
}

impl AppState {
    pub fn new(conn: Connection, tokens: TokenService, cookies: CookieSettings) -> Self {
        Self {
            db: Arc::new(Mutex::new(conn)),
            tokens,
            cookies,
        }
    }

    /// Runs one unit of work against the connection on the blocking pool.
    ///
    /// SQLite calls and password hashing never run on an async worker.
    pub async fn with_db<T, F>(&self, work: F) -> Result<T, ApiError>
    where
        F: FnOnce(&mut Connection, &TokenService) -> Result<T, ApiError> + Send + 'static,
        T: Send + 'static,
    {
        let db = Arc::clone(&self.db);
        let tokens = self.tokens.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = db.blocking_lock();
            work(&mut conn, &tokens)
        })
        .await
        .map_err(ApiError::internal)?
    }
}
