//! Authentication module for managing the user session.
//!
//! This module provides:
//! - `SessionManager`: owns the access/refresh token pair and drives the
//!   session state machine (restore, login, proactive refresh, logout)
//! - `TokenStore`: durable storage for the pair (file, OS keychain, memory)
//! - `AuthBackend`: the auth endpoints the session depends on
//! - `token`: unverified decoding of access-token claims

pub mod backend;
pub mod session;
pub mod store;
pub mod token;

pub use backend::AuthBackend;
pub use session::{RefreshOutcome, RefreshTask, SessionConfig, SessionManager, SessionState};
pub use store::{FileTokenStore, KeyringTokenStore, MemoryTokenStore, TokenStore};
pub use token::AccessClaims;
