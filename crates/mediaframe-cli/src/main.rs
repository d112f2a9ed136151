//! Media Frame CLI - a terminal client for the Media Frame processing service.
//!
//! Handles account sessions (login, refresh, logout), submits audio and video
//! files for processing, and shows usage and payment history.

mod app;
mod format;

use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use mediaframe_core::models::processor::{DEFAULT_LANGUAGE, DEFAULT_N_STEPS, DEFAULT_SPEED_FACTOR};
use mediaframe_core::models::{ProcessorAction, ProcessorRequest};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use app::App;

#[derive(Parser, Debug)]
#[command(name = "mediaframe", version, about = "Media Frame command-line client")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Log in and persist the session
    Login {
        /// Username (prompted if omitted)
        username: Option<String>,
    },
    /// End the session on this machine and notify the server
    Logout,
    /// Create a new account
    Register {
        #[arg(long)]
        username: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        first_name: String,
        #[arg(long)]
        last_name: String,
        #[arg(long)]
        phone: Option<String>,
    },
    /// Show whether a session is active
    Status,
    /// Show the account profile
    Profile,
    /// Permanently delete the account
    DeleteAccount {
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
    /// Submit a file for processing
    Process {
        /// One of: transcribe, shift, noisecancel, bassboost, speechidentifier,
        /// speedup, video-transcribe
        action: ProcessorAction,
        /// Input file (.mp3 for audio actions, a video container for video actions)
        file: PathBuf,
        /// Where to write the result
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Source language for speech-aware actions
        #[arg(long, default_value = DEFAULT_LANGUAGE)]
        language: String,
        /// Semitone steps for pitch shifting
        #[arg(long, default_value_t = DEFAULT_N_STEPS, allow_negative_numbers = true)]
        n_steps: i32,
        /// Playback multiplier for speedup
        #[arg(long, default_value_t = DEFAULT_SPEED_FACTOR)]
        speed_factor: f64,
    },
    /// List past processing jobs
    Usage,
    /// List payment history
    Payments,
    /// List subscription plans
    Plans,
    /// Start a checkout for a paid plan
    Checkout {
        /// basic or premium
        plan: String,
    },
    /// Confirm a completed checkout session
    ConfirmPayment { session_id: String },
    /// Request a password reset email
    ForgotPassword { email: String },
    /// Set a new password from a reset link
    ResetPassword { uid: String, token: String },
    /// Confirm an email address from a confirmation link
    ConfirmEmail { uid: String, token: String },
    /// Keep the session refreshed until interrupted
    Watch,
}

/// Initialize the tracing subscriber for logging
fn init_tracing() {
    // RUST_LOG controls the level (e.g., RUST_LOG=mediaframe_core=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    let mut app = App::new().await?;

    match cli.command {
        Command::Login { username } => app.login(username).await,
        Command::Logout => app.logout().await,
        Command::Register {
            username,
            email,
            first_name,
            last_name,
            phone,
        } => {
            app.register(username, email, first_name, last_name, phone)
                .await
        }
        Command::Status => app.status(),
        Command::Profile => app.profile().await,
        Command::DeleteAccount { yes } => app.delete_account(yes).await,
        Command::Process {
            action,
            file,
            output,
            language,
            n_steps,
            speed_factor,
        } => {
            let request = ProcessorRequest::new(action)
                .with_language(language)
                .with_n_steps(n_steps)
                .with_speed_factor(speed_factor);
            app.process(request, &file, output).await
        }
        Command::Usage => app.usage().await,
        Command::Payments => app.payments().await,
        Command::Plans => {
            app.plans();
            Ok(())
        }
        Command::Checkout { plan } => app.checkout(&plan).await,
        Command::ConfirmPayment { session_id } => app.confirm_payment(&session_id).await,
        Command::ForgotPassword { email } => app.forgot_password(email).await,
        Command::ResetPassword { uid, token } => app.reset_password(&uid, &token).await,
        Command::ConfirmEmail { uid, token } => app.confirm_email(&uid, &token).await,
        Command::Watch => app.watch().await,
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    init_tracing();
    info!(command = ?cli.command, "mediaframe starting");

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_process_args_parse() {
        let cli = Cli::try_parse_from([
            "mediaframe",
            "process",
            "shift",
            "song.mp3",
            "--n-steps",
            "-3",
        ])
        .unwrap();
        match cli.command {
            Command::Process {
                action,
                n_steps,
                language,
                speed_factor,
                ..
            } => {
                assert_eq!(action, ProcessorAction::Shift);
                assert_eq!(n_steps, -3);
                assert_eq!(language, DEFAULT_LANGUAGE);
                assert_eq!(speed_factor, DEFAULT_SPEED_FACTOR);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_unknown_action_rejected() {
        assert!(Cli::try_parse_from(["mediaframe", "process", "explode", "a.mp3"]).is_err());
    }
}
