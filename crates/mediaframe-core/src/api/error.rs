use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Rate limited - please wait before retrying")]
    RateLimited,

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            return body.to_string();
        }
        let mut end = MAX_ERROR_BODY_LENGTH;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
    }

    /// Pull a human-readable message out of a backend error body.
    ///
    /// The backend answers with `{"error": "..."}` for most failures, `{"detail": "..."}`
    /// from its auth layer, and `{"field": ["msg", ...]}` for serializer validation errors.
    pub fn extract_message(body: &str) -> String {
        let trimmed = body.trim();
        if trimmed.is_empty() {
            return "no response body".to_string();
        }

        let Ok(value) = serde_json::from_str::<Value>(trimmed) else {
            return Self::truncate_body(trimmed);
        };

        let Some(object) = value.as_object() else {
            return Self::truncate_body(trimmed);
        };

        for key in ["error", "message", "detail"] {
            if let Some(Value::String(msg)) = object.get(key) {
                return Self::truncate_body(msg);
            }
        }

        let field_errors: Vec<String> = object
            .iter()
            .filter_map(|(field, errors)| {
                let messages: Vec<&str> = match errors {
                    Value::Array(items) => items.iter().filter_map(Value::as_str).collect(),
                    Value::String(msg) => vec![msg.as_str()],
                    _ => Vec::new(),
                };
                if messages.is_empty() {
                    None
                } else {
                    Some(format!("{}: {}", field, messages.join(" ")))
                }
            })
            .collect();

        if field_errors.is_empty() {
            Self::truncate_body(trimmed)
        } else {
            Self::truncate_body(&field_errors.join("; "))
        }
    }

    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let message = Self::extract_message(body);
        match status.as_u16() {
            400 | 409 | 422 => ApiError::BadRequest(message),
            401 => ApiError::Unauthorized(message),
            403 => ApiError::AccessDenied(message),
            404 => ApiError::NotFound(message),
            429 => ApiError::RateLimited,
            500..=599 => ApiError::ServerError(message),
            _ => ApiError::InvalidResponse(format!("Status {}: {}", status, message)),
        }
    }

    /// Whether the backend rejected the caller's credentials or token.
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, ApiError::Unauthorized(_) | ApiError::AccessDenied(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn test_extract_error_field() {
        let body = r#"{"error": "You have reached your daily processing limit."}"#;
        let msg = ApiError::extract_message(body);
        assert_eq!(msg, "You have reached your daily processing limit.");
    }

    #[test]
    fn test_extract_detail_field() {
        let body = r#"{"detail": "Token is invalid or expired", "code": "token_not_valid"}"#;
        let msg = ApiError::extract_message(body);
        assert_eq!(msg, "Token is invalid or expired");
    }

    #[test]
    fn test_extract_field_errors() {
        let body = r#"{"username": ["A user with that username already exists."]}"#;
        let msg = ApiError::extract_message(body);
        assert_eq!(msg, "username: A user with that username already exists.");
    }

    #[test]
    fn test_extract_non_json_body() {
        assert_eq!(ApiError::extract_message("Bad Gateway"), "Bad Gateway");
        assert_eq!(ApiError::extract_message("   "), "no response body");
    }

    #[test]
    fn test_truncate_long_body() {
        let body = "x".repeat(MAX_ERROR_BODY_LENGTH + 20);
        let msg = ApiError::extract_message(&body);
        assert!(msg.starts_with(&"x".repeat(MAX_ERROR_BODY_LENGTH)));
        assert!(msg.contains("truncated"));
    }

    #[test]
    fn test_from_status_mapping() {
        let body = r#"{"error": "Invalid credentials"}"#;
        assert!(matches!(
            ApiError::from_status(StatusCode::UNAUTHORIZED, body),
            ApiError::Unauthorized(ref m) if m == "Invalid credentials"
        ));
        assert!(matches!(
            ApiError::from_status(StatusCode::BAD_REQUEST, body),
            ApiError::BadRequest(_)
        ));
        assert!(matches!(
            ApiError::from_status(StatusCode::TOO_MANY_REQUESTS, body),
            ApiError::RateLimited
        ));
        assert!(matches!(
            ApiError::from_status(StatusCode::BAD_GATEWAY, body),
            ApiError::ServerError(_)
        ));
        assert!(matches!(
            ApiError::from_status(StatusCode::IM_A_TEAPOT, body),
            ApiError::InvalidResponse(_)
        ));
    }

    #[test]
    fn test_is_auth_failure() {
        assert!(ApiError::Unauthorized("x".into()).is_auth_failure());
        assert!(ApiError::AccessDenied("x".into()).is_auth_failure());
        assert!(!ApiError::ServerError("x".into()).is_auth_failure());
    }
}
