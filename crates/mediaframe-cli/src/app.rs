//! Command handlers.
//!
//! `App` wires the configuration, API client, and session manager together
//! and implements one method per CLI command.

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use chrono::Utc;
use mediaframe_core::auth::{token, AuthBackend, RefreshOutcome, SessionConfig};
use mediaframe_core::models::{
    ForgotPasswordRequest, LoginRequest, Plan, ProcessorOutput, ProcessorRequest,
    RegisterRequest, ResetPasswordRequest, SpeechInfo, PLANS,
};
use mediaframe_core::{ApiClient, Config, SessionManager, SessionState};
use tracing::{debug, info, warn};

use crate::format::{
    file_basename, format_offset, format_remaining, format_timestamp, truncate_string,
};

/// Environment variable supplying the login password non-interactively
const PASSWORD_ENV: &str = "MEDIAFRAME_PASSWORD";

/// Width of the file column in the usage table
const FILE_COLUMN_WIDTH: usize = 40;

pub struct App {
    config: Config,
    api: ApiClient,
    session: Arc<SessionManager>,
}

impl App {
    /// Load configuration and restore the persisted session
    pub async fn new() -> Result<Self> {
        let config = match Config::load() {
            Ok(c) => c,
            Err(e) => {
                warn!(error = %e, "Failed to load config, using defaults");
                Config::default()
            }
        };
        debug!(api = %config.api_base_url, store = ?config.token_store, "Config loaded");

        let api = ApiClient::new(&config)?;
        let store = config.token_store()?;
        let session = Arc::new(SessionManager::new(
            Arc::new(api.clone()) as Arc<dyn AuthBackend>,
            store,
            SessionConfig::from(&config),
        ));

        let state = session.initialize().await;
        debug!(?state, "Session initialized");

        Ok(Self {
            config,
            api,
            session,
        })
    }

    /// API client carrying the current access token, refreshed first if due.
    async fn authed_api(&self) -> Result<ApiClient> {
        if self.session.tick().await == RefreshOutcome::ForcedLogout {
            bail!("Session expired. Please log in again.");
        }
        let token = self
            .session
            .access_token()
            .ok_or_else(|| anyhow!("Not logged in. Run `mediaframe login` first."))?;
        Ok(self.api.with_token(token))
    }

    // ===== Authentication =====

    pub async fn login(&mut self, username: Option<String>) -> Result<()> {
        if self.session.is_logged_in() {
            println!("Already logged in. Run `mediaframe logout` to switch accounts.");
            return Ok(());
        }

        let username = match username {
            Some(u) => u,
            None => prompt_line("Username", self.config.last_username.as_deref())?,
        };
        let password = match std::env::var(PASSWORD_ENV) {
            Ok(p) if !p.is_empty() => p,
            _ => prompt_password("Password: ")?,
        };

        println!("Authenticating...");
        self.session
            .login(&LoginRequest::new(username.trim(), password))
            .await?;

        self.config.last_username = Some(username.trim().to_string());
        if let Err(e) = self.config.save() {
            warn!(error = %e, "Failed to save config");
        }

        println!("Login successful!");
        Ok(())
    }

    pub async fn logout(&self) -> Result<()> {
        self.session.logout().await;
        println!("Logged out.");
        Ok(())
    }

    pub async fn register(
        &self,
        username: String,
        email: String,
        first_name: String,
        last_name: String,
        phone_number: Option<String>,
    ) -> Result<()> {
        let password = prompt_password("Password: ")?;
        let confirm = prompt_password("Confirm password: ")?;
        if password != confirm {
            bail!("Passwords do not match");
        }

        let request = RegisterRequest {
            username,
            email,
            first_name,
            last_name,
            phone_number: phone_number.unwrap_or_default(),
            password,
        };
        let response = self.api.register(&request).await?;
        println!(
            "{}",
            response.message_or(
                "Registration successful. Check your email to confirm your account."
            )
        );
        Ok(())
    }

    pub async fn confirm_email(&self, uid: &str, token: &str) -> Result<()> {
        let response = self.api.confirm_email(uid, token).await?;
        println!("{}", response.message_or("Email confirmed. You can now log in."));
        Ok(())
    }

    pub async fn forgot_password(&self, email: String) -> Result<()> {
        let response = self
            .api
            .forgot_password(&ForgotPasswordRequest { email })
            .await?;
        println!(
            "{}",
            response.message_or("If the email exists, a password reset link has been sent.")
        );
        Ok(())
    }

    pub async fn reset_password(&self, uid: &str, token: &str) -> Result<()> {
        let password = prompt_password("New password: ")?;
        let response = self
            .api
            .reset_password(uid, token, &ResetPasswordRequest { password })
            .await?;
        println!(
            "{}",
            response.message_or("Password reset successfully. You can now log in.")
        );
        Ok(())
    }

    pub fn status(&self) -> Result<()> {
        match self.session.state() {
            SessionState::LoggedIn => {
                let access = self.session.access_token().unwrap_or_default();
                let expiry = token::expires_at(&access)
                    .map(|exp| format_remaining(exp - Utc::now()))
                    .unwrap_or_else(|| "unknown".to_string());
                println!("Logged in");
                if let Some(user) = &self.config.last_username {
                    println!("  User:           {}", user);
                }
                println!("  Access expires: {}", expiry);
                println!("  API:            {}", self.api.base_url());
            }
            SessionState::LoggedOut | SessionState::Initializing => {
                println!("Not logged in");
                println!("  API:            {}", self.api.base_url());
            }
        }
        Ok(())
    }

    /// Keep the session fresh until interrupted or the session ends.
    pub async fn watch(&self) -> Result<()> {
        if !self.session.is_logged_in() {
            bail!("Not logged in. Run `mediaframe login` first.");
        }

        let interval = self.session.config().refresh_interval;
        let mut states = self.session.subscribe();
        let task = self.session.spawn_refresh_loop();
        info!(interval_secs = interval.as_secs(), "Refresh loop started");
        println!(
            "Keeping session alive (checking every {}s). Press Ctrl-C to stop.",
            interval.as_secs()
        );

        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    println!("Stopping.");
                    break;
                }
                changed = states.changed() => {
                    if changed.is_err() || *states.borrow_and_update() == SessionState::LoggedOut {
                        println!("Session ended. Please log in again.");
                        break;
                    }
                }
            }
        }

        task.shutdown().await;
        Ok(())
    }

    // ===== Account =====

    pub async fn profile(&self) -> Result<()> {
        let api = self.authed_api().await?;
        let profile = api.fetch_profile(self.session.user_id()).await?;

        println!("Username: {}", profile.username);
        println!("Email:    {}", profile.email);
        println!("Name:     {}", profile.full_name());
        if let Some(phone) = profile.phone_number.as_deref().filter(|p| !p.is_empty()) {
            println!("Phone:    {}", phone);
        }
        println!("Tier:     {}", profile.tier);
        if let Some(joined) = &profile.date_joined {
            println!("Joined:   {}", format_timestamp(joined));
        }
        Ok(())
    }

    pub async fn delete_account(&self, confirmed: bool) -> Result<()> {
        let api = self.authed_api().await?;
        if !confirmed && !confirm("Permanently delete your account?")? {
            println!("Cancelled.");
            return Ok(());
        }
        api.delete_account().await?;
        self.session.logout().await;
        println!("Account deleted.");
        Ok(())
    }

    // ===== Processor =====

    pub async fn process(
        &self,
        request: ProcessorRequest,
        file: &Path,
        output: Option<PathBuf>,
    ) -> Result<()> {
        let file_name = file
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| anyhow!("Invalid file path: {}", file.display()))?
            .to_string();
        request.action.validate_file_name(&file_name)?;

        let bytes = std::fs::read(file)
            .with_context(|| format!("Failed to read {}", file.display()))?;

        let api = self.authed_api().await?;
        println!("Processing {} ({})...", file_name, request.action.label());
        let result = api.process(&request, &file_name, bytes).await?;

        match result {
            ProcessorOutput::Transcript(text) => match output {
                Some(path) => write_output(&path, text.as_bytes())?,
                None => println!("\n{}", text),
            },
            ProcessorOutput::SpeechInfo(info) => match output {
                Some(path) => write_output(&path, serde_json::to_string_pretty(&info)?.as_bytes())?,
                None => print_speech_info(&info),
            },
            ProcessorOutput::Media { file_name, bytes } => {
                let path = output.unwrap_or_else(|| PathBuf::from(file_name));
                write_output(&path, &bytes)?;
            }
        }
        Ok(())
    }

    pub async fn usage(&self) -> Result<()> {
        let api = self.authed_api().await?;
        let usages = api.fetch_processor_usage().await?;
        if usages.is_empty() {
            println!("No processing history yet.");
            return Ok(());
        }

        println!("{:<20} {:<20} {}", "When", "Operation", "File");
        for usage in &usages {
            println!(
                "{:<20} {:<20} {}",
                format_timestamp(&usage.timestamp),
                usage.label(),
                truncate_string(file_basename(&usage.file), FILE_COLUMN_WIDTH)
            );
        }
        Ok(())
    }

    // ===== Payments =====

    pub async fn payments(&self) -> Result<()> {
        let api = self.authed_api().await?;
        let payments = api.fetch_payments().await?;
        if payments.is_empty() {
            println!("No payments yet.");
            return Ok(());
        }

        println!("{:<20} {:>10} {:<10} {}", "Date", "Amount", "Status", "Plan");
        for payment in &payments {
            let plan = PLANS
                .iter()
                .find(|p| p.price_id == Some(payment.price_id.as_str()))
                .map(|p| p.tier.display_name())
                .unwrap_or("-");
            println!(
                "{:<20} {:>10} {:<10} {}",
                format_timestamp(&payment.created_at),
                format!("${}", payment.amount),
                payment.status.to_string(),
                plan
            );
        }
        Ok(())
    }

    pub fn plans(&self) {
        for plan in PLANS.iter() {
            println!("{} ({})", plan.tier, plan.price);
            for feature in plan.features {
                println!("  - {}", feature);
            }
        }
    }

    pub async fn checkout(&self, plan_name: &str) -> Result<()> {
        let plan = Plan::find(plan_name).ok_or_else(|| {
            anyhow!(
                "Unknown plan '{}'. Choose one of: basic, premium",
                plan_name
            )
        })?;
        let Some(price_id) = plan.price_id else {
            bail!("You can't choose to join the free tier");
        };

        let api = self.authed_api().await?;
        let profile = api.fetch_profile(self.session.user_id()).await?;
        if profile.tier == plan.tier {
            println!("You are already on the {} plan.", plan.tier);
            return Ok(());
        }

        let checkout = api.create_checkout(price_id).await?;
        println!("Complete your payment at:\n{}", checkout.url);
        println!("Then run `mediaframe confirm-payment <session_id>`.");
        Ok(())
    }

    pub async fn confirm_payment(&self, session_id: &str) -> Result<()> {
        let api = self.authed_api().await?;
        let confirmation = api.confirm_payment(session_id).await?;
        let message = confirmation
            .message
            .as_deref()
            .unwrap_or(if confirmation.is_success() {
                "Payment completed successfully"
            } else {
                "Payment not completed"
            });
        if !confirmation.is_success() {
            bail!("{}", message);
        }
        println!("{}", message);
        Ok(())
    }
}

fn print_speech_info(info: &SpeechInfo) {
    println!("\nTranscription:\n{}\n", info.transcription);
    if info.speaker_segments.is_empty() {
        return;
    }
    println!("Speakers:");
    for segment in &info.speaker_segments {
        println!(
            "  [{} - {}] {}: {}",
            format_offset(segment.start_time),
            format_offset(segment.end_time),
            segment.speaker,
            segment.text
        );
    }
}

fn write_output(path: &Path, bytes: &[u8]) -> Result<()> {
    std::fs::write(path, bytes).with_context(|| format!("Failed to write {}", path.display()))?;
    println!("Saved {}", path.display());
    Ok(())
}

fn prompt_line(label: &str, default: Option<&str>) -> Result<String> {
    match default {
        Some(d) => print!("{} [{}]: ", label, d),
        None => print!("{}: ", label),
    }
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    let input = input.trim();
    Ok(match default {
        Some(d) if input.is_empty() => d.to_string(),
        _ => input.to_string(),
    })
}

fn prompt_password(prompt: &str) -> Result<String> {
    let password = rpassword::prompt_password(prompt)?;
    Ok(password)
}

fn confirm(question: &str) -> Result<bool> {
    print!("{} [y/N]: ", question);
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(matches!(input.trim().to_lowercase().as_str(), "y" | "yes"))
}
