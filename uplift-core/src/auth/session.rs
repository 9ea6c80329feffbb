//! Authentication session: token lifetime and the PKCE authorization flow.
//!
//! The session moves between three states:
//!
//! - `NoToken`: nothing cached; the next request runs the browser flow.
//! - `Valid`: an access token is cached and `now < expires_at`.
//! - `Expired`: the access token is stale (or was never issued but a refresh
//!   token was supplied); the next request refreshes silently.
//!
//! Every transition replaces the whole [`AuthSession`] value.

use super::callback::RedirectListener;
use super::error::AuthError;
use super::pkce::{random_token, PkcePair, RANDOM_TOKEN_BYTES};
use super::token::{TokenEndpoint, TokenSet};
use crate::cancel::or_cancelled;
use crate::events::{emit, EventSender, UploadEvent};
use crate::security::{constant_time_eq, mask_token};
use chrono::{DateTime, Utc};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use url::Url;

/// Strava authorization endpoint.
pub const AUTHORIZE_URL: &str = "https://www.strava.com/oauth/authorize";

/// Scope needed to read the profile and create activities.
pub const DEFAULT_SCOPE: &str = "read,activity:write";

// ============================================================================
// Session value
// ============================================================================

/// Lifecycle state of an [`AuthSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    NoToken,
    Valid,
    Expired,
}

/// Cached credentials. Immutable; replaced as a whole on each transition.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthSession {
    access_token: Option<String>,
    refresh_token: Option<String>,
    expires_at: Option<DateTime<Utc>>,
}

impl AuthSession {
    /// Session with nothing cached.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Session seeded with an externally supplied refresh token.
    ///
    /// It starts out `Expired`, so the first request refreshes silently.
    pub fn from_refresh_token(refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: None,
            refresh_token: Some(refresh_token.into()),
            expires_at: None,
        }
    }

    /// Session built from a token exchange.
    ///
    /// Keeps `previous_refresh` when the endpoint did not rotate the refresh token.
    pub fn from_tokens(tokens: TokenSet, previous_refresh: Option<String>) -> Self {
        Self {
            access_token: Some(tokens.access_token),
            refresh_token: tokens.refresh_token.or(previous_refresh),
            expires_at: Some(tokens.expires_at),
        }
    }

    pub fn state_at(&self, now: DateTime<Utc>) -> SessionState {
        match (&self.access_token, &self.refresh_token, self.expires_at) {
            (None, None, _) => SessionState::NoToken,
            (Some(_), _, Some(expires_at)) if now < expires_at => SessionState::Valid,
            _ => SessionState::Expired,
        }
    }

    pub fn access_token(&self) -> Option<&str> {
        self.access_token.as_deref()
    }

    pub fn refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_deref()
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }
}

// ============================================================================
// Pending authorization
// ============================================================================

/// Secrets of one in-flight browser authorization. Dropped once the code is
/// exchanged or the attempt fails.
#[derive(Debug)]
pub struct PendingAuthorization {
    pub state: String,
    pub pkce: PkcePair,
    pub redirect_uri: String,
}

impl PendingAuthorization {
    pub fn new(redirect_uri: String) -> Self {
        Self {
            state: random_token(RANDOM_TOKEN_BYTES),
            pkce: PkcePair::generate(),
            redirect_uri,
        }
    }
}

// ============================================================================
// Configuration and browser seam
// ============================================================================

/// Settings for the authorization request.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub client_id: String,
    pub authorize_url: String,
    pub scope: String,
    /// `auto` or `force`.
    pub approval_prompt: String,
    pub redirect_timeout: Duration,
    /// Whether the browser flow may run. Non-interactive runs only refresh.
    pub allow_interactive: bool,
}

impl AuthConfig {
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            authorize_url: AUTHORIZE_URL.to_string(),
            scope: DEFAULT_SCOPE.to_string(),
            approval_prompt: "auto".to_string(),
            redirect_timeout: Duration::from_secs(300),
            allow_interactive: true,
        }
    }
}

/// Opens the authorization URL for the user.
pub trait BrowserLauncher: Send + Sync {
    fn open(&self, url: &str) -> Result<(), String>;
}

/// Launches the system default browser.
#[derive(Debug, Default)]
pub struct SystemBrowser;

impl BrowserLauncher for SystemBrowser {
    fn open(&self, url: &str) -> Result<(), String> {
        webbrowser::open(url).map_err(|e| e.to_string())
    }
}

// ============================================================================
// Authenticator
// ============================================================================

/// Owns the [`AuthSession`] and hands out access tokens.
pub struct Authenticator {
    config: AuthConfig,
    endpoint: Box<dyn TokenEndpoint>,
    browser: Box<dyn BrowserLauncher>,
    session: AuthSession,
    events: Option<EventSender>,
}

impl Authenticator {
    pub fn new(config: AuthConfig, endpoint: Box<dyn TokenEndpoint>) -> Self {
        Self {
            config,
            endpoint,
            browser: Box::new(SystemBrowser),
            session: AuthSession::empty(),
            events: None,
        }
    }

    /// Replace the browser launcher.
    pub fn with_browser(mut self, browser: Box<dyn BrowserLauncher>) -> Self {
        self.browser = browser;
        self
    }

    /// Start from an existing session (e.g. an externally supplied refresh token).
    pub fn with_session(mut self, session: AuthSession) -> Self {
        self.session = session;
        self
    }

    /// Report progress on `events`.
    pub fn with_events(mut self, events: EventSender) -> Self {
        self.events = Some(events);
        self
    }

    pub fn session(&self) -> &AuthSession {
        &self.session
    }

    pub fn state(&self) -> SessionState {
        self.session.state_at(Utc::now())
    }

    /// The cached access token, without checking expiry or refreshing.
    pub fn cached_token(&self) -> Option<&str> {
        self.session.access_token()
    }

    /// Current access token, or `None` if none could be obtained.
    ///
    /// `None` means the caller should abort its current operation. The reason
    /// has already been logged and reported.
    pub async fn access_token(&mut self, cancel: &CancellationToken) -> Option<String> {
        match self.try_access_token(cancel).await {
            Ok(token) => Some(token),
            Err(e) => {
                error!(error = %e, "Could not get access token");
                emit(
                    self.events.as_ref(),
                    UploadEvent::AuthFailed {
                        reason: e.to_string(),
                    },
                );
                None
            }
        }
    }

    /// Current access token, with the reason when none could be obtained.
    pub async fn try_access_token(
        &mut self,
        cancel: &CancellationToken,
    ) -> Result<String, AuthError> {
        let state = self.session.state_at(Utc::now());
        debug!(?state, "Checking session");

        match (state, self.session.access_token(), self.session.refresh_token()) {
            (SessionState::Valid, Some(token), _) => Ok(token.to_string()),
            (SessionState::Expired, _, Some(refresh_token)) => {
                let refresh_token = refresh_token.to_string();
                self.refresh(&refresh_token, cancel).await
            }
            _ => self.authorize(cancel).await,
        }
    }

    async fn refresh(
        &mut self,
        refresh_token: &str,
        cancel: &CancellationToken,
    ) -> Result<String, AuthError> {
        info!("Access token expired, refreshing");
        let result = or_cancelled(cancel, self.endpoint.exchange_refresh_token(refresh_token))
            .await
            .ok_or(AuthError::Cancelled)?;

        match result {
            Ok(tokens) => {
                self.session = AuthSession::from_tokens(tokens, Some(refresh_token.to_string()));
                info!("Token refreshed successfully");
                emit(self.events.as_ref(), UploadEvent::TokenRefreshed);
                Ok(self.current_token())
            }
            Err(e) => {
                warn!(error = %e, "Refresh failed; the next request will reauthorize");
                self.session = AuthSession::empty();
                Err(e.into())
            }
        }
    }

    async fn authorize(&mut self, cancel: &CancellationToken) -> Result<String, AuthError> {
        if !self.config.allow_interactive {
            return Err(AuthError::InteractiveDisabled);
        }
        if self.config.client_id.trim().is_empty() {
            return Err(AuthError::MissingCredentials);
        }

        info!("Starting authorization, you will be redirected to the browser");
        self.session = AuthSession::empty();

        let listener = RedirectListener::bind().await?;
        let pending = PendingAuthorization::new(listener.redirect_uri());
        info!(redirect_uri = %pending.redirect_uri, "Redirect listener ready");

        let url = self.authorization_url(&pending)?;
        emit(
            self.events.as_ref(),
            UploadEvent::AuthorizationStarted { url: url.clone() },
        );
        if let Err(e) = self.browser.open(&url) {
            warn!(error = %e, "Could not open browser automatically");
            emit(self.events.as_ref(), UploadEvent::BrowserUnavailable { url });
        }

        let captured = listener.wait(self.config.redirect_timeout, cancel).await?;

        if !constant_time_eq(captured.state.as_bytes(), pending.state.as_bytes()) {
            error!(
                received = %mask_token(&captured.state),
                "Received redirect with invalid state"
            );
            return Err(AuthError::StateMismatch);
        }
        debug!(code = %mask_token(&captured.code), "Authorization code received");

        let tokens = or_cancelled(
            cancel,
            self.endpoint.exchange_code(
                &captured.code,
                &pending.pkce.code_verifier,
                &pending.redirect_uri,
            ),
        )
        .await
        .ok_or(AuthError::Cancelled)??;

        self.session = AuthSession::from_tokens(tokens, None);
        info!("The access token has been acquired");
        emit(self.events.as_ref(), UploadEvent::Authorized);
        Ok(self.current_token())
    }

    /// Build the browser URL for `pending`.
    pub fn authorization_url(&self, pending: &PendingAuthorization) -> Result<String, AuthError> {
        let url = Url::parse_with_params(
            &self.config.authorize_url,
            &[
                ("response_type", "code"),
                ("approval_prompt", self.config.approval_prompt.as_str()),
                ("scope", self.config.scope.as_str()),
                ("redirect_uri", pending.redirect_uri.as_str()),
                ("client_id", self.config.client_id.as_str()),
                ("state", pending.state.as_str()),
                ("code_challenge", pending.pkce.code_challenge.as_str()),
                ("code_challenge_method", "S256"),
            ],
        )
        .map_err(|e| AuthError::Redirect(format!("invalid authorize url: {e}")))?;
        Ok(url.into())
    }

    fn current_token(&self) -> String {
        self.session.access_token().unwrap_or_default().to_string()
    }
}
