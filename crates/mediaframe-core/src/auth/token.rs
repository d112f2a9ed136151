//! Unverified decoding of access-token claims.
//!
//! The client never holds the signing secret; it only reads the payload
//! segment to learn when the token expires and whose it is.

use anyhow::{anyhow, Context, Result};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Deserializer};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AccessClaims {
    /// Expiry as Unix seconds.
    #[serde(default)]
    pub exp: Option<i64>,
    #[serde(default, deserialize_with = "lenient_id")]
    pub user_id: Option<i64>,
}

impl AccessClaims {
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.exp.and_then(|secs| DateTime::from_timestamp(secs, 0))
    }
}

// The backend has emitted user_id both as a number and as a numeric string.
fn lenient_id<'de, D>(deserializer: D) -> std::result::Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Int(i64),
        Text(String),
    }

    Ok(match Option::<RawId>::deserialize(deserializer)? {
        Some(RawId::Int(id)) => Some(id),
        Some(RawId::Text(text)) => text.trim().parse().ok(),
        None => None,
    })
}

/// Decode the payload segment of a JWT without verifying its signature.
pub fn decode_claims(token: &str) -> Result<AccessClaims> {
    let mut segments = token.split('.');
    let payload = match (segments.next(), segments.next(), segments.next()) {
        (Some(_), Some(payload), Some(_)) if !payload.is_empty() => payload,
        _ => return Err(anyhow!("Token is not a three-part JWT")),
    };

    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .context("Failed to base64-decode token payload")?;

    serde_json::from_slice(&bytes).context("Failed to parse token claims")
}

/// Expiry embedded in the token, if it can be read.
pub fn expires_at(token: &str) -> Option<DateTime<Utc>> {
    decode_claims(token).ok().and_then(|claims| claims.expires_at())
}

/// True when `now` is within `threshold` of the token's expiry, or past it.
///
/// A token whose expiry cannot be read is treated as due, so a malformed
/// token gets replaced rather than trusted forever.
pub fn needs_refresh(token: &str, now: DateTime<Utc>, threshold: Duration) -> bool {
    match expires_at(token) {
        Some(expiry) => expiry
            .checked_sub_signed(threshold)
            .map_or(true, |window_start| now >= window_start),
        None => true,
    }
}

pub fn is_expired(token: &str, now: DateTime<Utc>) -> bool {
    needs_refresh(token, now, Duration::zero())
}
