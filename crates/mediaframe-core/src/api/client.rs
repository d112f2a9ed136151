//! API client for communicating with the Media Frame REST API.
//!
//! This module provides the `ApiClient` struct for the auth, processor,
//! and payments endpoints. Authenticated calls send the access token as a
//! bearer header; the refresh token only ever goes to the refresh and logout
//! endpoints.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{header, Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;
use tracing::{debug, info};

use crate::auth::AuthBackend;
use crate::config::Config;
use crate::models::processor::{SpeechIdentifierResponse, TranscriptResponse};
use crate::models::{
    CheckoutSession, ForgotPasswordRequest, LoginRequest, MessageResponse, Payment,
    PaymentConfirmation, ProcessorAction, ProcessorOutput, ProcessorRequest, ProcessorUsage,
    RefreshedTokens, RegisterRequest, ResetPasswordRequest, TokenPair, UserProfile,
};

use super::ApiError;

// ============================================================================
// Constants
// ============================================================================

/// Upper bound for a processing upload and its result.
/// Transcription and diarization run synchronously on the backend and can
/// take minutes for long recordings.
const PROCESSING_TIMEOUT_SECS: u64 = 600;

/// API client for Media Frame.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: Arc<str>,
    token: Option<Arc<String>>,
}

impl ApiClient {
    /// Create a new API client
    pub fn new(config: &Config) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: Arc::from(config.api_base_url.trim_end_matches('/')),
            token: None,
        })
    }

    /// Create a new ApiClient with the given token, sharing the connection pool.
    pub fn with_token(&self, token: impl Into<Arc<String>>) -> Self {
        Self {
            client: self.client.clone(),
            base_url: Arc::clone(&self.base_url),
            token: Some(token.into()),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn require_token(&self) -> Result<&str> {
        self.token
            .as_deref()
            .map(String::as_str)
            .ok_or_else(|| ApiError::Unauthorized("Not logged in".to_string()).into())
    }

    fn authed(&self, builder: RequestBuilder) -> Result<RequestBuilder> {
        Ok(builder.bearer_auth(self.require_token()?))
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: reqwest::Response) -> Result<reqwest::Response> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body).into())
        }
    }

    async fn send_json<T: DeserializeOwned>(request: RequestBuilder, what: &str) -> Result<T> {
        let response = request
            .send()
            .await
            .with_context(|| format!("Failed to send {} request", what))?;
        let response = Self::check_response(response).await?;
        response
            .json()
            .await
            .with_context(|| format!("Failed to parse {} response", what))
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let request = self.authed(self.client.get(self.url(path)))?;
        Self::send_json(request, path).await
    }

    async fn post<T: DeserializeOwned, B: Serialize>(&self, path: &str, body: &B) -> Result<T> {
        let request = self.client.post(self.url(path)).json(body);
        Self::send_json(request, path).await
    }

    // ===== Authentication =====

    /// Exchange credentials for an access/refresh pair
    pub async fn login(&self, request: &LoginRequest) -> Result<TokenPair> {
        let tokens: TokenPair = self.post("auth/login/", request).await?;
        debug!(username = %request.username, "Login accepted");
        Ok(tokens)
    }

    pub async fn register(&self, request: &RegisterRequest) -> Result<MessageResponse> {
        request.validate()?;
        let response = self.post("auth/register/", request).await?;
        info!(username = %request.username, "Account registered");
        Ok(response)
    }

    /// Mint a new access token from a refresh token
    pub async fn refresh_token(&self, refresh_token: &str) -> Result<RefreshedTokens> {
        self.post("auth/token/refresh/", &json!({ "refresh": refresh_token }))
            .await
    }

    /// Invalidate the refresh token server-side
    pub async fn logout(&self, tokens: &TokenPair) -> Result<()> {
        let response = self
            .client
            .post(self.url("auth/logout/"))
            .bearer_auth(&tokens.access)
            .json(&json!({ "refresh_token": tokens.refresh }))
            .send()
            .await
            .context("Failed to send logout request")?;
        Self::check_response(response).await?;
        Ok(())
    }

    pub async fn confirm_email(&self, uid: &str, token: &str) -> Result<MessageResponse> {
        let url = self.url(&format!("auth/confirm-email/{}/{}/", uid.trim(), token.trim()));
        Self::send_json(self.client.get(url), "confirm-email").await
    }

    pub async fn forgot_password(
        &self,
        request: &ForgotPasswordRequest,
    ) -> Result<MessageResponse> {
        request.validate()?;
        self.post("auth/forgot-password/", request).await
    }

    pub async fn reset_password(
        &self,
        uid: &str,
        token: &str,
        request: &ResetPasswordRequest,
    ) -> Result<MessageResponse> {
        request.validate()?;
        let path = format!("auth/reset-password/{}/{}/", uid.trim(), token.trim());
        self.post(&path, request).await
    }

    // ===== Account =====

    /// Fetch the profile of the logged-in user. `user_id` comes from the
    /// access token's claims; without it the bare profile route is used.
    pub async fn fetch_profile(&self, user_id: Option<i64>) -> Result<UserProfile> {
        let path = match user_id {
            Some(id) => format!("auth/user/{}/", id),
            None => "auth/user/".to_string(),
        };
        self.get(&path).await
    }

    pub async fn delete_account(&self) -> Result<()> {
        let request = self.authed(self.client.delete(self.url("auth/delete-account/")))?;
        let response = request
            .send()
            .await
            .context("Failed to send delete-account request")?;
        Self::check_response(response).await?;
        info!("Account deleted");
        Ok(())
    }

    // ===== Processor =====

    /// Upload a file for processing and collect the result.
    pub async fn process(
        &self,
        request: &ProcessorRequest,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<ProcessorOutput> {
        request.validate(file_name, bytes.len())?;
        let action = request.action;

        let file_part = Part::bytes(bytes).file_name(file_name.to_string());
        let mut form = Form::new().part("file", file_part);
        for (name, value) in request.form_fields() {
            form = form.text(name, value);
        }

        let url = self.url(&format!("processor/{}/", action.slug()));
        info!(action = %action, file = file_name, "Submitting file for processing");

        let response = self
            .authed(self.client.post(&url))?
            .timeout(Duration::from_secs(PROCESSING_TIMEOUT_SECS))
            .multipart(form)
            .send()
            .await
            .with_context(|| format!("Failed to send {} request", action.slug()))?;
        let response = Self::check_response(response).await?;

        if action.returns_json() {
            let body = response
                .bytes()
                .await
                .with_context(|| format!("Failed to read {} response", action.slug()))?;
            return json_output(action, &body);
        }

        let file_name = response
            .headers()
            .get(header::CONTENT_DISPOSITION)
            .and_then(|value| value.to_str().ok())
            .and_then(filename_from_disposition)
            .unwrap_or_else(|| action.default_output_name().to_string());
        let bytes = response
            .bytes()
            .await
            .context("Failed to read processed media")?;
        debug!(file = %file_name, size = bytes.len(), "Received processed media");
        Ok(ProcessorOutput::Media {
            file_name,
            bytes: bytes.to_vec(),
        })
    }

    pub async fn fetch_processor_usage(&self) -> Result<Vec<ProcessorUsage>> {
        self.get("processor/processor-usage/").await
    }

    // ===== Payments =====

    pub async fn fetch_payments(&self) -> Result<Vec<Payment>> {
        self.get("payments/").await
    }

    /// Open a checkout session for a plan's price; returns the hosted checkout URL.
    pub async fn create_checkout(&self, price_id: &str) -> Result<CheckoutSession> {
        let url = self.url(&format!("payments/stripe-checkout/{}/", price_id.trim()));
        let request = self.authed(self.client.post(url))?;
        Self::send_json(request, "stripe-checkout").await
    }

    /// Confirm a completed checkout session.
    pub async fn confirm_payment(&self, session_id: &str) -> Result<PaymentConfirmation> {
        let request = self
            .authed(self.client.get(self.url("payments/payment-success/")))?
            .query(&[("session_id", session_id.trim())]);
        Self::send_json(request, "payment-success").await
    }
}

#[async_trait]
impl AuthBackend for ApiClient {
    async fn login(&self, request: &LoginRequest) -> Result<TokenPair> {
        ApiClient::login(self, request).await
    }

    async fn refresh(&self, refresh_token: &str) -> Result<RefreshedTokens> {
        self.refresh_token(refresh_token).await
    }

    async fn logout(&self, tokens: &TokenPair) -> Result<()> {
        ApiClient::logout(self, tokens).await
    }
}

/// Decode the body of a processor action that answers with JSON.
fn json_output(action: ProcessorAction, body: &[u8]) -> Result<ProcessorOutput> {
    match action {
        ProcessorAction::SpeechIdentifier => {
            let parsed: SpeechIdentifierResponse = serde_json::from_slice(body)
                .context("Failed to parse speech identification response")?;
            let info = parsed.speech_info.ok_or_else(|| {
                ApiError::InvalidResponse("Response has no speech_info".to_string())
            })?;
            Ok(ProcessorOutput::SpeechInfo(info))
        }
        _ => {
            let parsed: TranscriptResponse =
                serde_json::from_slice(body).context("Failed to parse transcription response")?;
            Ok(ProcessorOutput::Transcript(parsed.transcript.unwrap_or_default()))
        }
    }
}

/// Extract the file name from a `Content-Disposition` header value.
fn filename_from_disposition(value: &str) -> Option<String> {
    value
        .split(';')
        .map(str::trim)
        .find_map(|param| param.strip_prefix("filename="))
        .map(|name| name.trim().trim_matches('"'))
        .and_then(|name| {
            // Keep only the final path component
            let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
            (!base.is_empty()).then(|| base.to_string())
        })
}
