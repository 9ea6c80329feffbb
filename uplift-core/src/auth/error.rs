//! Authentication errors.

use super::token::ExchangeError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Authorization denied by user: {error}")]
    Denied {
        error: String,
        description: Option<String>,
    },
    #[error("Authorization response state does not match the request")]
    StateMismatch,
    #[error("Malformed authorization response: missing {0}")]
    MissingParameter(&'static str),
    #[error("Token exchange failed: {0}")]
    Exchange(#[from] ExchangeError),
    #[error("Redirect listener error: {0}")]
    Redirect(String),
    #[error("Timed out after {0:?} waiting for the authorization redirect")]
    Timeout(std::time::Duration),
    #[error("Client credentials are not configured")]
    MissingCredentials,
    #[error("Interactive authorization is disabled")]
    InteractiveDisabled,
    #[error("Authorization cancelled")]
    Cancelled,
}

impl AuthError {
    /// Whether the user explicitly declined the authorization prompt.
    pub fn is_denied(&self) -> bool {
        matches!(self, Self::Denied { .. })
    }
}
