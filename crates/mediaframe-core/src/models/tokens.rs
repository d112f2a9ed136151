use std::fmt;

use serde::{Deserialize, Serialize};

/// Access/refresh credentials as issued by `auth/login/`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

impl TokenPair {
    pub fn new(access: impl Into<String>, refresh: impl Into<String>) -> Self {
        Self {
            access: access.into(),
            refresh: refresh.into(),
        }
    }

    /// A pair is only usable when both halves are present.
    pub fn is_complete(&self) -> bool {
        !self.access.is_empty() && !self.refresh.is_empty()
    }
}

// Tokens never reach log output.
impl fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenPair")
            .field("access", &"<redacted>")
            .field("refresh", &"<redacted>")
            .finish()
    }
}

/// Response of `auth/token/refresh/`. The refresh token is only present when
/// the backend rotates it.
#[derive(Clone, Deserialize)]
pub struct RefreshedTokens {
    pub access: String,
    #[serde(default)]
    pub refresh: Option<String>,
}

impl fmt::Debug for RefreshedTokens {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefreshedTokens")
            .field("access", &"<redacted>")
            .field("rotated", &self.refresh.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_redacts_tokens() {
        let pair = TokenPair::new("secret-access", "secret-refresh");
        let rendered = format!("{:?}", pair);
        assert!(!rendered.contains("secret"));
    }

    #[test]
    fn test_is_complete() {
        assert!(TokenPair::new("a", "r").is_complete());
        assert!(!TokenPair::new("", "r").is_complete());
        assert!(!TokenPair::new("a", "").is_complete());
    }

    #[test]
    fn test_refresh_response_without_rotation() {
        let parsed: RefreshedTokens = serde_json::from_str(r#"{"access": "A2"}"#).unwrap();
        assert_eq!(parsed.access, "A2");
        assert!(parsed.refresh.is_none());
    }
}
