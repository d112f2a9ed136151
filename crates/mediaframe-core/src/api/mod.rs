//! REST API client module for the Media Frame backend.
//!
//! This module provides the `ApiClient` for the auth, processor, and
//! payments endpoints, and `ApiError` for mapping failed responses to
//! user-readable messages.
//!
//! The API uses JWT bearer authentication; tokens are issued by
//! `auth/login/` and renewed through `auth/token/refresh/`.

pub mod client;
pub mod error;

pub use client::ApiClient;
pub use error::ApiError;
