//! HTTP surface of the journal backend.
//!
//! # Responsibility
//! - Map routes onto `journal_core` services.
//! - Resolve the requesting account from bearer tokens or auth cookies.
//! - Translate core errors into status codes and `{"detail": ...}` bodies.

pub mod config;
pub mod error;
pub mod extract;
mod routes;
pub mod state;
pub mod wire;

pub use routes::build_router;
pub use state::{AppState, CookieSettings};
