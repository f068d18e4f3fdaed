//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into use-case level APIs.
//! - Apply ownership and permission rules before touching storage.
//! - Keep the HTTP layer decoupled from storage details.

pub mod account_service;
pub mod journal_service;
