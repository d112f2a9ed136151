//! Session lifecycle: startup restore, login, proactive refresh, logout.
//!
//! The manager is the single owner of the token pair. Every change to the
//! in-memory pair and to the persisted record happens under one lock, so the
//! two never disagree outside a single synchronous update. The lock is never
//! held across a network call.
//!
//! A logout (explicit or forced) bumps the session epoch. A refresh captures
//! the epoch before it goes to the network and drops its result if the epoch
//! moved in the meantime, so a late response cannot resurrect a session.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration as StdDuration;

use anyhow::{anyhow, Result};
use chrono::{Duration, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::api::ApiError;
use crate::config::Config;
use crate::models::{LoginRequest, RefreshedTokens, TokenPair};

use super::backend::AuthBackend;
use super::store::TokenStore;
use super::token;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Initializing,
    LoggedOut,
    LoggedIn,
}

/// What a refresh check or refresh attempt did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// New tokens were applied and persisted.
    Refreshed,
    /// The access token is outside the refresh window.
    NotDue,
    /// No session to refresh.
    NotLoggedIn,
    /// Another refresh is still waiting on the network.
    AlreadyInFlight,
    /// The session ended while the request was in flight; the response was dropped.
    Discarded,
    /// The backend rejected the refresh and the session was ended.
    ForcedLogout,
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// How often the refresh loop checks the access token.
    pub refresh_interval: StdDuration,
    /// Refresh once the access token is this close to expiring.
    pub refresh_threshold: Duration,
    /// Upper bound on the best-effort logout notification.
    pub logout_timeout: StdDuration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            refresh_interval: StdDuration::from_secs(180),
            refresh_threshold: Duration::minutes(3),
            logout_timeout: StdDuration::from_secs(5),
        }
    }
}

/// Shortest refresh-loop period accepted.
const MIN_REFRESH_INTERVAL: StdDuration = StdDuration::from_millis(1);

/// Longest refresh-loop period accepted.
const MAX_REFRESH_INTERVAL: StdDuration = StdDuration::from_secs(24 * 60 * 60);

/// Longest logout notification bound accepted.
const MAX_LOGOUT_TIMEOUT: StdDuration = StdDuration::from_secs(60);

fn max_refresh_threshold() -> Duration {
    Duration::days(1)
}

impl SessionConfig {
    /// Clamp every timing into a range the timers and clock arithmetic can hold.
    fn bounded(self) -> Self {
        Self {
            refresh_interval: self
                .refresh_interval
                .clamp(MIN_REFRESH_INTERVAL, MAX_REFRESH_INTERVAL),
            refresh_threshold: self
                .refresh_threshold
                .clamp(Duration::zero(), max_refresh_threshold()),
            logout_timeout: self.logout_timeout.min(MAX_LOGOUT_TIMEOUT),
        }
    }
}

impl From<&Config> for SessionConfig {
    fn from(config: &Config) -> Self {
        let refresh_threshold = i64::try_from(config.refresh_threshold_secs)
            .ok()
            .and_then(Duration::try_seconds)
            .unwrap_or_else(max_refresh_threshold);
        Self {
            refresh_interval: StdDuration::from_secs(config.refresh_interval_secs.max(1)),
            refresh_threshold,
            logout_timeout: StdDuration::from_secs(config.logout_timeout_secs),
        }
        .bounded()
    }
}

struct Inner {
    state: SessionState,
    tokens: Option<TokenPair>,
    epoch: u64,
}

/// Clears the in-flight flag when a refresh attempt ends, however it ends.
struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct SessionManager {
    backend: Arc<dyn AuthBackend>,
    store: Arc<dyn TokenStore>,
    config: SessionConfig,
    inner: Mutex<Inner>,
    refreshing: AtomicBool,
    state_tx: watch::Sender<SessionState>,
}

impl SessionManager {
    pub fn new(
        backend: Arc<dyn AuthBackend>,
        store: Arc<dyn TokenStore>,
        config: SessionConfig,
    ) -> Self {
        let (state_tx, _) = watch::channel(SessionState::Initializing);
        Self {
            backend,
            store,
            config: config.bounded(),
            inner: Mutex::new(Inner {
                state: SessionState::Initializing,
                tokens: None,
                epoch: 0,
            }),
            refreshing: AtomicBool::new(false),
            state_tx,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // Inner holds plain data; a panic mid-update cannot leave it half-written.
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn set_state(&self, inner: &mut Inner, state: SessionState) {
        if inner.state != state {
            debug!(from = ?inner.state, to = ?state, "Session state change");
        }
        inner.state = state;
        self.state_tx.send_replace(state);
    }

    /// Drop the session locally: memory, storage, and state.
    fn end_session(&self, inner: &mut Inner) -> Option<TokenPair> {
        inner.epoch += 1;
        let previous = inner.tokens.take();
        if let Err(e) = self.store.clear() {
            error!(error = %e, "Failed to clear persisted session");
        }
        self.set_state(inner, SessionState::LoggedOut);
        previous
    }

    /// Persist and install a pair, moving to `LoggedIn`.
    fn commit(&self, inner: &mut Inner, tokens: TokenPair) -> Result<()> {
        if let Err(e) = self.store.save(&tokens) {
            self.end_session(inner);
            return Err(e.context("Failed to persist session"));
        }
        inner.tokens = Some(tokens);
        self.set_state(inner, SessionState::LoggedIn);
        Ok(())
    }

    // ===== Accessors =====

    pub fn state(&self) -> SessionState {
        self.lock().state
    }

    pub fn is_logged_in(&self) -> bool {
        self.state() == SessionState::LoggedIn
    }

    /// Current bearer token, for business requests.
    pub fn access_token(&self) -> Option<String> {
        let inner = self.lock();
        match inner.state {
            SessionState::LoggedIn => inner.tokens.as_ref().map(|t| t.access.clone()),
            _ => None,
        }
    }

    /// User id claimed by the current access token.
    pub fn user_id(&self) -> Option<i64> {
        self.access_token()
            .and_then(|access| token::decode_claims(&access).ok())
            .and_then(|claims| claims.user_id)
    }

    /// Watch state transitions.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state_tx.subscribe()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    // ===== Transitions =====

    /// Restore the persisted session.
    ///
    /// An unexpired pair is adopted without touching the network. An expired
    /// one gets exactly one refresh attempt; if that fails the stored record
    /// is wiped.
    pub async fn initialize(&self) -> SessionState {
        let stored = match self.store.load() {
            Ok(stored) => stored,
            Err(e) => {
                warn!(error = %e, "Discarding unreadable persisted session");
                None
            }
        };

        let (epoch, stored) = {
            let mut inner = self.lock();
            let Some(tokens) = stored.filter(TokenPair::is_complete) else {
                info!("No persisted session");
                self.end_session(&mut inner);
                return inner.state;
            };

            if !token::is_expired(&tokens.access, Utc::now()) {
                info!("Restored persisted session");
                inner.tokens = Some(tokens);
                self.set_state(&mut inner, SessionState::LoggedIn);
                return inner.state;
            }
            (inner.epoch, tokens)
        };

        info!("Persisted access token expired, refreshing");
        let Some(_in_flight) = InFlight::acquire(&self.refreshing) else {
            // `refresh` never runs before the session is restored, so the
            // holder is another `initialize`; wait for it to settle the state.
            let mut states = self.subscribe();
            let _ = states
                .wait_for(|state| *state != SessionState::Initializing)
                .await;
            return self.state();
        };
        let refresh_token = stored.refresh.clone();
        let result = self
            .backend
            .refresh(&refresh_token)
            .await
            .and_then(|refreshed| rotate(stored, refreshed));

        let mut inner = self.lock();
        if inner.epoch != epoch {
            debug!("Session changed during startup refresh, discarding response");
            return inner.state;
        }
        match result {
            Ok(tokens) => {
                if let Err(e) = self.commit(&mut inner, tokens) {
                    error!(error = %e, "Could not persist refreshed session");
                }
            }
            Err(e) => {
                warn!(
                    error = %e,
                    rejected = rejected_by_backend(&e),
                    "Startup refresh failed, logging out"
                );
                self.end_session(&mut inner);
            }
        }
        inner.state
    }

    /// Exchange credentials at the backend and start a session.
    pub async fn login(&self, request: &LoginRequest) -> Result<()> {
        request.validate()?;
        let tokens = self.backend.login(request).await?;
        if !tokens.is_complete() {
            return Err(anyhow!("Login response is missing a token"));
        }
        self.adopt(tokens)?;
        info!(username = %request.username, "Logged in");
        Ok(())
    }

    /// Start a session from a pair obtained elsewhere.
    pub fn adopt(&self, tokens: TokenPair) -> Result<()> {
        if !tokens.is_complete() {
            return Err(anyhow!("Both access and refresh tokens are required"));
        }
        let mut inner = self.lock();
        inner.epoch += 1;
        self.commit(&mut inner, tokens)
    }

    /// End the session.
    ///
    /// Local state is cleared first and unconditionally; the server is then
    /// told to invalidate the refresh token, bounded by `logout_timeout`.
    /// Calling this with no session is a no-op.
    pub async fn logout(&self) {
        let previous = {
            let mut inner = self.lock();
            self.end_session(&mut inner)
        };

        let Some(tokens) = previous else {
            debug!("Logout with no active session");
            return;
        };
        info!("Logged out");

        match tokio::time::timeout(self.config.logout_timeout, self.backend.logout(&tokens)).await
        {
            Ok(Ok(())) => debug!("Server acknowledged logout"),
            Ok(Err(e)) => warn!(error = %e, "Server logout failed"),
            Err(_) => warn!(
                timeout_ms = self.config.logout_timeout.as_millis() as u64,
                "Server logout timed out"
            ),
        }
    }

    /// Periodic check: refresh if the access token is inside the threshold window.
    pub async fn tick(&self) -> RefreshOutcome {
        let due = {
            let inner = self.lock();
            match (inner.state, inner.tokens.as_ref()) {
                (SessionState::LoggedIn, Some(tokens)) => token::needs_refresh(
                    &tokens.access,
                    Utc::now(),
                    self.config.refresh_threshold,
                ),
                _ => return RefreshOutcome::NotLoggedIn,
            }
        };

        if !due {
            return RefreshOutcome::NotDue;
        }
        self.refresh().await
    }

    /// Refresh now, regardless of expiry. At most one refresh runs at a time.
    pub async fn refresh(&self) -> RefreshOutcome {
        if !self.is_logged_in() {
            return RefreshOutcome::NotLoggedIn;
        }
        let Some(_in_flight) = InFlight::acquire(&self.refreshing) else {
            debug!("Refresh already in flight");
            return RefreshOutcome::AlreadyInFlight;
        };

        let (epoch, current) = {
            let inner = self.lock();
            match (inner.state, inner.tokens.as_ref()) {
                (SessionState::LoggedIn, Some(tokens)) => (inner.epoch, tokens.clone()),
                _ => return RefreshOutcome::NotLoggedIn,
            }
        };

        let previous_refresh = current.refresh.clone();
        let result = self
            .backend
            .refresh(&previous_refresh)
            .await
            .and_then(|refreshed| rotate(current, refreshed));

        let mut inner = self.lock();
        if inner.epoch != epoch || inner.state != SessionState::LoggedIn {
            debug!("Session changed during refresh, discarding response");
            return RefreshOutcome::Discarded;
        }

        match result {
            Ok(tokens) => {
                let rotated = tokens.refresh != previous_refresh;
                match self.commit(&mut inner, tokens) {
                    Ok(()) => {
                        info!(rotated, "Access token refreshed");
                        RefreshOutcome::Refreshed
                    }
                    Err(e) => {
                        error!(error = %e, "Could not persist refreshed session, logging out");
                        RefreshOutcome::ForcedLogout
                    }
                }
            }
            Err(e) => {
                warn!(
                    error = %e,
                    rejected = rejected_by_backend(&e),
                    "Token refresh failed, logging out"
                );
                self.end_session(&mut inner);
                RefreshOutcome::ForcedLogout
            }
        }
    }

    /// Run `tick` every `refresh_interval` until the returned handle is dropped
    /// or the manager itself goes away.
    pub fn spawn_refresh_loop(self: &Arc<Self>) -> RefreshTask {
        let manager: Weak<Self> = Arc::downgrade(self);
        let period = self.config.refresh_interval;

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                let Some(manager) = manager.upgrade() else {
                    debug!("Session manager dropped, stopping refresh loop");
                    break;
                };
                let outcome = manager.tick().await;
                debug!(?outcome, "Refresh check");
            }
        });

        RefreshTask {
            handle: Some(handle),
        }
    }
}

/// Apply a refresh response; the refresh token only changes if the backend sent one.
fn rotate(current: TokenPair, refreshed: RefreshedTokens) -> Result<TokenPair> {
    let tokens = TokenPair {
        access: refreshed.access,
        refresh: refreshed
            .refresh
            .filter(|r| !r.is_empty())
            .unwrap_or(current.refresh),
    };
    if !tokens.is_complete() {
        return Err(anyhow!("Refresh response is missing the access token"));
    }
    Ok(tokens)
}

/// Whether a refresh failed because the backend turned the token down,
/// as opposed to a transport or server fault.
fn rejected_by_backend(error: &anyhow::Error) -> bool {
    error
        .downcast_ref::<ApiError>()
        .is_some_and(ApiError::is_auth_failure)
}

/// Handle to the background refresh loop. Dropping it stops the timer.
pub struct RefreshTask {
    handle: Option<JoinHandle<()>>,
}

impl RefreshTask {
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Stop the timer and wait for the task to wind down.
    pub async fn shutdown(mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            let _ = handle.await;
        }
    }
}

impl Drop for RefreshTask {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
