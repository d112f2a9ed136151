use anyhow::Result;
use async_trait::async_trait;

use crate::models::{LoginRequest, RefreshedTokens, TokenPair};

/// The three auth endpoints the session lifecycle depends on.
///
/// `ApiClient` is the production implementation; tests substitute an
/// in-process fake.
#[async_trait]
pub trait AuthBackend: Send + Sync {
    /// Exchange credentials for a token pair.
    async fn login(&self, request: &LoginRequest) -> Result<TokenPair>;

    /// Mint a new access token. The response may also rotate the refresh token.
    async fn refresh(&self, refresh_token: &str) -> Result<RefreshedTokens>;

    /// Ask the server to invalidate the refresh token.
    async fn logout(&self, tokens: &TokenPair) -> Result<()>;
}
