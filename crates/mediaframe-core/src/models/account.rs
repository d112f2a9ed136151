use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::validation::{require, validate_email, ValidationError};

#[derive(Clone, Serialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

impl LoginRequest {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        require("Username", &self.username)?;
        if self.password.is_empty() {
            return Err(ValidationError::Required("Password"));
        }
        Ok(())
    }
}

impl fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginRequest")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Clone, Serialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone_number: String,
    pub password: String,
}

impl RegisterRequest {
    pub fn validate(&self) -> Result<(), ValidationError> {
        require("Username", &self.username)?;
        validate_email(&self.email)?;
        require("First name", &self.first_name)?;
        require("Last name", &self.last_name)?;
        if self.password.is_empty() {
            return Err(ValidationError::Required("Password"));
        }
        Ok(())
    }
}

impl fmt::Debug for RegisterRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisterRequest")
            .field("username", &self.username)
            .field("email", &self.email)
            .field("first_name", &self.first_name)
            .field("last_name", &self.last_name)
            .field("phone_number", &self.phone_number)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

impl ForgotPasswordRequest {
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_email(&self.email)
    }
}

#[derive(Clone, Serialize)]
pub struct ResetPasswordRequest {
    pub password: String,
}

impl ResetPasswordRequest {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.password.is_empty() {
            return Err(ValidationError::Required("Password"));
        }
        Ok(())
    }
}

/// Generic `{message}` acknowledgement returned by the account endpoints.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MessageResponse {
    #[serde(default)]
    pub message: Option<String>,
}

impl MessageResponse {
    pub fn message_or<'a>(&'a self, fallback: &'a str) -> &'a str {
        self.message.as_deref().unwrap_or(fallback)
    }
}

/// Subscription level gating which processing operations are available.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    #[default]
    Free,
    Basic,
    Premium,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Free => "free",
            Tier::Basic => "basic",
            Tier::Premium => "premium",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Tier::Free => "Free",
            Tier::Basic => "Basic",
            Tier::Premium => "Premium",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(default)]
    pub id: Option<i64>,
    pub username: String,
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub tier: Tier,
    #[serde(default)]
    pub date_joined: Option<DateTime<Utc>>,
}

impl UserProfile {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

/// A purchasable subscription plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Plan {
    pub tier: Tier,
    pub price: &'static str,
    /// Stripe price identifier; `None` for the free plan, which cannot be bought.
    pub price_id: Option<&'static str>,
    pub features: &'static [&'static str],
}

pub const PLANS: [Plan; 3] = [
    Plan {
        tier: Tier::Free,
        price: "$0/month",
        price_id: None,
        features: &[
            "2 audio/video processing tasks per day",
            "Access to transcribe and noisecancel",
            "Basic processing speed",
        ],
    },
    Plan {
        tier: Tier::Basic,
        price: "$15/month",
        price_id: Some("price_1QdwivRZZTayXP3ZAb0BM0ry"),
        features: &[
            "10 audio/video processing tasks per day",
            "Access to all operations",
            "Faster processing speed",
            "Priority support",
        ],
    },
    Plan {
        tier: Tier::Premium,
        price: "$100/month",
        price_id: Some("price_1QdwsJRZZTayXP3ZRTlV52rk"),
        features: &[
            "Unlimited audio/video processing tasks",
            "Access to all operations",
            "Fastest processing speed",
            "Dedicated support and custom solutions",
        ],
    },
];

impl Plan {
    /// Look up a plan by tier name, case-insensitively.
    pub fn find(name: &str) -> Option<&'static Plan> {
        let name = name.trim();
        PLANS
            .iter()
            .find(|plan| plan.tier.as_str().eq_ignore_ascii_case(name))
    }

    pub fn is_purchasable(&self) -> bool {
        self.price_id.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn register_request() -> RegisterRequest {
        RegisterRequest {
            username: "alice".to_string(),
            email: "alice@example.com".to_string(),
            first_name: "Alice".to_string(),
            last_name: "Liddell".to_string(),
            phone_number: String::new(),
            password: "hunter22".to_string(),
        }
    }

    #[test]
    fn test_register_validation_accepts_complete_form() {
        assert!(register_request().validate().is_ok());
    }

    #[test]
    fn test_register_validation_rejects_missing_fields() {
        let mut req = register_request();
        req.first_name = " ".to_string();
        assert_eq!(req.validate(), Err(ValidationError::Required("First name")));

        let mut req = register_request();
        req.email = "not-an-email".to_string();
        assert_eq!(req.validate(), Err(ValidationError::InvalidEmail));

        let mut req = register_request();
        req.password.clear();
        assert_eq!(req.validate(), Err(ValidationError::Required("Password")));
    }

    #[test]
    fn test_register_serializes_backend_field_names() {
        let json = serde_json::to_value(register_request()).unwrap();
        assert_eq!(json["first_name"], "Alice");
        assert_eq!(json["phone_number"], "");
    }

    #[test]
    fn test_login_debug_hides_password() {
        let req = LoginRequest::new("a", "b-secret");
        assert!(!format!("{:?}", req).contains("b-secret"));
    }

    #[test]
    fn test_profile_parses_tier() {
        let profile: UserProfile = serde_json::from_str(
            r#"{"id": 7, "username": "alice", "email": "a@example.com",
                "first_name": "Alice", "last_name": "Liddell", "tier": "premium"}"#,
        )
        .unwrap();
        assert_eq!(profile.tier, Tier::Premium);
        assert_eq!(profile.full_name(), "Alice Liddell");
    }

    #[test]
    fn test_profile_defaults_to_free_tier() {
        let profile: UserProfile =
            serde_json::from_str(r#"{"username": "bob", "email": "b@example.com"}"#).unwrap();
        assert_eq!(profile.tier, Tier::Free);
    }

    #[test]
    fn test_plan_lookup() {
        let basic = Plan::find("BASIC").unwrap();
        assert_eq!(basic.tier, Tier::Basic);
        assert!(basic.is_purchasable());
        assert!(!Plan::find("free").unwrap().is_purchasable());
        assert!(Plan::find("enterprise").is_none());
    }
}
