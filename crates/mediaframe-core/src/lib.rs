//! Core library for the Media Frame client.
//!
//! - `api`: typed client for the auth, processor, and payments endpoints
//! - `auth`: session lifecycle and token persistence
//! - `models`: request/response types and form validation
//! - `config`: user configuration

pub mod api;
pub mod auth;
pub mod config;
pub mod models;

pub use api::{ApiClient, ApiError};
pub use auth::{SessionManager, SessionState};
pub use config::Config;
