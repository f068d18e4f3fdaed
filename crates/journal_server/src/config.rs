//! Command-line and environment configuration.

use clap::{Parser, Subcommand};
use journal_core::auth::jwt::MIN_SECRET_BYTES;
use journal_core::{AuthError, TokenService};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Journal backend HTTP server
#[derive(Parser, Debug, Clone)]
#[command(name = "journal_server")]
#[command(about = "HTTP backend for journal entries, todos and habits")]
pub struct Args {
    /// Address to listen on
    #[arg(long, env = "LISTEN", default_value = "127.0.0.1:8000")]
    pub listen: SocketAddr,

    /// SQLite database file
    #[arg(long, env = "DATABASE_PATH", default_value = "journal.sqlite3")]
    pub database_path: PathBuf,

    /// HS256 signing secret, at least 32 bytes (optional in dev mode)
    #[arg(long, env = "JWT_SECRET", hide_env_values = true)]
    pub jwt_secret: Option<String>,

    /// Access token lifetime in seconds
    #[arg(long, env = "ACCESS_TOKEN_LIFETIME_SECS", default_value = "300")]
    pub access_token_lifetime_secs: u64,

    /// Refresh token lifetime in seconds
    #[arg(long, env = "REFRESH_TOKEN_LIFETIME_SECS", default_value = "86400")]
    pub refresh_token_lifetime_secs: u64,

    /// Mark auth cookies `Secure`
    #[arg(long, env = "JWT_COOKIE_SECURE", default_value = "false")]
    pub jwt_cookie_secure: bool,

    /// Development mode: allows running without JWT_SECRET
    #[arg(long, env = "DEV_MODE", default_value = "false")]
    pub dev_mode: bool,

    /// Log level (trace|debug|info|warn|error); defaults by build mode
    #[arg(long, env = "LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Absolute directory for rolling log files; stderr only when unset
    #[arg(long, env = "LOG_DIR")]
    pub log_dir: Option<String>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Run the HTTP server (default)
    Serve,
    /// Create an administrator account
    CreateSuperuser {
        #[arg(long)]
        email: String,
        #[arg(long, env = "JOURNAL_SUPERUSER_PASSWORD", hide_env_values = true)]
        password: String,
    },
}

impl Args {
    /// Checks cross-field constraints clap cannot express.
    pub fn validate(&self) -> Result<(), String> {
        match self.jwt_secret.as_deref() {
            None if !self.dev_mode => {
                return Err("JWT_SECRET is required unless --dev-mode is set".to_string());
            }
            Some(secret) if secret.len() < MIN_SECRET_BYTES => {
                return Err(format!(
                    "JWT_SECRET must be at least {MIN_SECRET_BYTES} bytes"
                ));
            }
            _ => {}
        }

        if self.access_token_lifetime_secs == 0 || self.refresh_token_lifetime_secs == 0 {
            return Err("token lifetimes must be positive".to_string());
        }
        if self.access_token_lifetime_secs > self.refresh_token_lifetime_secs {
            return Err(
                "ACCESS_TOKEN_LIFETIME_SECS must not exceed REFRESH_TOKEN_LIFETIME_SECS"
                    .to_string(),
            );
        }
        Ok(())
    }

    pub fn access_lifetime(&self) -> Duration {
        Duration::from_secs(self.access_token_lifetime_secs)
    }

    pub fn refresh_lifetime(&self) -> Duration {
        Duration::from_secs(self.refresh_token_lifetime_secs)
    }

    /// Builds the token service; dev mode without a secret uses the public dev key.
    pub fn token_service(&self) -> Result<TokenService, AuthError> {
        match self.jwt_secret.as_deref() {
            Some(secret) => {
                TokenService::new(secret, self.access_lifetime(), self.refresh_lifetime())
            }
            None if self.dev_mode => Ok(TokenService::new_dev()
                .with_lifetimes(self.access_lifetime(), self.refresh_lifetime())),
            None => Err(AuthError::WeakSecret("secret must not be empty")),
        }
    }

    pub fn log_level(&self) -> &str {
        self.log_level
            .as_deref()
            .unwrap_or(journal_core::default_log_level())
    }
}
