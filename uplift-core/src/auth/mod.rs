//! Authentication module for the Strava OAuth flow.
//!
//! This module provides:
//! - PKCE verifier/challenge and state generation
//! - Loopback redirect listener
//! - Token endpoint client (authorization code + refresh token grants)
//! - Session with token lifetime tracking and silent refresh

pub mod callback;
pub mod error;
pub mod pkce;
pub mod session;
pub mod token;

pub use callback::{CapturedRedirect, RedirectListener, RedirectParams};
pub use error::AuthError;
pub use pkce::{code_challenge_s256, random_token, PkcePair};
pub use session::{
    AuthConfig, AuthSession, Authenticator, BrowserLauncher, PendingAuthorization, SessionState,
    SystemBrowser, AUTHORIZE_URL, DEFAULT_SCOPE,
};
pub use token::{
    ClientCredentials, ExchangeError, TokenClient, TokenEndpoint, TokenSet, TOKEN_URL,
};
