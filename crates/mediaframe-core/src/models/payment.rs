use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
    #[serde(other)]
    Unknown,
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PaymentStatus::Pending => "Pending",
            PaymentStatus::Completed => "Completed",
            PaymentStatus::Failed => "Failed",
            PaymentStatus::Unknown => "Unknown",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    #[serde(default)]
    pub id: Option<i64>,
    pub stripe_session_id: String,
    /// Decimal amount as rendered by the backend, e.g. `"15.00"`.
    pub amount: String,
    pub status: PaymentStatus,
    pub created_at: DateTime<Utc>,
    pub price_id: String,
    #[serde(default)]
    pub user: Option<i64>,
}

/// Response of `payments/stripe-checkout/<price_id>/`.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutSession {
    pub url: String,
}

/// Response of `payments/payment-success/`.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentConfirmation {
    pub status: String,
    #[serde(default)]
    pub message: Option<String>,
}

impl PaymentConfirmation {
    pub fn is_success(&self) -> bool {
        self.status.eq_ignore_ascii_case("success")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payment_list_parses() {
        let json = r#"[{
            "id": 3,
            "stripe_session_id": "cs_test_123",
            "amount": "15.00",
            "status": "completed",
            "created_at": "2025-01-05T10:20:30Z",
            "price_id": "price_1QdwivRZZTayXP3ZAb0BM0ry",
            "user": 7
        }]"#;
        let payments: Vec<Payment> = serde_json::from_str(json).unwrap();
        assert_eq!(payments.len(), 1);
        assert_eq!(payments[0].status, PaymentStatus::Completed);
        assert_eq!(payments[0].amount, "15.00");
    }

    #[test]
    fn test_unknown_status_is_tolerated() {
        let status: PaymentStatus = serde_json::from_str(r#""refunded""#).unwrap();
        assert_eq!(status, PaymentStatus::Unknown);
    }

    #[test]
    fn test_confirmation_success() {
        let ok: PaymentConfirmation = serde_json::from_str(
            r#"{"status": "success", "message": "Payment completed successfully"}"#,
        )
        .unwrap();
        assert!(ok.is_success());
        let pending: PaymentConfirmation =
            serde_json::from_str(r#"{"status": "error", "message": "Payment not completed"}"#)
                .unwrap();
        assert!(!pending.is_success());
    }
}
