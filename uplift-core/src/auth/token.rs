//! Token endpoint client: `authorization_code` and `refresh_token` grants.

use crate::security::mask_token;
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Strava token endpoint.
pub const TOKEN_URL: &str = "https://www.strava.com/oauth/token";

const BODY_SNIPPET_CHARS: usize = 500;

#[derive(Debug, Error)]
pub enum ExchangeError {
    #[error("Token endpoint request failed: {0}")]
    Network(String),
    #[error("Token endpoint returned {status}{}{}: {body}",
        .code.as_deref().map(|c| format!(" code={c}")).unwrap_or_default(),
        .message.as_deref().map(|m| format!(" message={m}")).unwrap_or_default())]
    Status {
        status: u16,
        code: Option<String>,
        message: Option<String>,
        body: String,
    },
    #[error("Malformed token response: {0}")]
    Malformed(String),
}

/// Tokens issued by a successful exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenSet {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: DateTime<Utc>,
}

/// The two grants the session needs from the token endpoint.
#[async_trait]
pub trait TokenEndpoint: Send + Sync {
    /// Exchange an authorization code (plus PKCE verifier) for tokens.
    async fn exchange_code(
        &self,
        code: &str,
        code_verifier: &str,
        redirect_uri: &str,
    ) -> Result<TokenSet, ExchangeError>;

    /// Exchange a refresh token for a new token set.
    async fn exchange_refresh_token(&self, refresh_token: &str)
        -> Result<TokenSet, ExchangeError>;
}

/// OAuth client credentials registered with the platform.
#[derive(Debug, Clone)]
pub struct ClientCredentials {
    pub client_id: String,
    pub client_secret: String,
}

/// HTTP implementation of [`TokenEndpoint`].
pub struct TokenClient {
    http: reqwest::Client,
    token_url: String,
    credentials: ClientCredentials,
}

impl TokenClient {
    pub fn new(credentials: ClientCredentials) -> Self {
        Self {
            http: reqwest::Client::new(),
            token_url: TOKEN_URL.to_string(),
            credentials,
        }
    }

    /// Override the token endpoint (for testing with wiremock).
    pub fn with_token_url(mut self, url: &str) -> Self {
        self.token_url = url.to_string();
        self
    }

    async fn post_form(&self, form: &[(&str, &str)]) -> Result<TokenSet, ExchangeError> {
        let response = self
            .http
            .post(&self.token_url)
            .form(form)
            .timeout(Duration::from_secs(30))
            .send()
            .await
            .map_err(|e| ExchangeError::Network(format!("POST {}: {e}", self.token_url)))?;

        parse_token_response(response).await
    }
}

#[async_trait]
impl TokenEndpoint for TokenClient {
    async fn exchange_code(
        &self,
        code: &str,
        code_verifier: &str,
        redirect_uri: &str,
    ) -> Result<TokenSet, ExchangeError> {
        info!("Exchanging authorization code for tokens");
        debug!(code = %mask_token(code), redirect_uri, "Authorization code grant");
        self.post_form(&[
            ("code", code),
            ("redirect_uri", redirect_uri),
            ("client_id", &self.credentials.client_id),
            ("client_secret", &self.credentials.client_secret),
            ("code_verifier", code_verifier),
            ("grant_type", "authorization_code"),
        ])
        .await
    }

    async fn exchange_refresh_token(
        &self,
        refresh_token: &str,
    ) -> Result<TokenSet, ExchangeError> {
        info!("Exchanging refresh token for new access token");
        self.post_form(&[
            ("refresh_token", refresh_token),
            ("client_id", &self.credentials.client_id),
            ("client_secret", &self.credentials.client_secret),
            ("grant_type", "refresh_token"),
        ])
        .await
    }
}

async fn parse_token_response(response: reqwest::Response) -> Result<TokenSet, ExchangeError> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| ExchangeError::Network(format!("reading token response: {e}")))?;

    if !status.is_success() {
        let (code, message) = parse_error_details(&body);
        let snippet: String = body.chars().take(BODY_SNIPPET_CHARS).collect();
        warn!(status = status.as_u16(), ?code, ?message, "Token endpoint rejected the request");
        return Err(ExchangeError::Status {
            status: status.as_u16(),
            code,
            message,
            body: snippet,
        });
    }

    parse_token_body(&body, Utc::now())
}

/// Parse a successful token response body.
///
/// `expires_at` (epoch seconds) is authoritative; `expires_in` relative to
/// `now` is the fallback.
pub(crate) fn parse_token_body(body: &str, now: DateTime<Utc>) -> Result<TokenSet, ExchangeError> {
    let value: Value = serde_json::from_str(body)
        .map_err(|e| ExchangeError::Malformed(format!("invalid json: {e}")))?;

    let access_token = non_empty_str(&value, "access_token")
        .ok_or_else(|| ExchangeError::Malformed("missing access_token".to_string()))?;
    let refresh_token = non_empty_str(&value, "refresh_token");

    let expires_at = match value.get("expires_at").and_then(parse_i64_lossy) {
        Some(epoch) => Utc
            .timestamp_opt(epoch, 0)
            .single()
            .ok_or_else(|| ExchangeError::Malformed(format!("invalid expires_at: {epoch}")))?,
        None => {
            let expires_in = value
                .get("expires_in")
                .and_then(parse_i64_lossy)
                .ok_or_else(|| ExchangeError::Malformed("missing expires_at".to_string()))?;
            now + chrono::Duration::seconds(expires_in)
        }
    };

    debug!(
        access_token = %mask_token(&access_token),
        has_refresh_token = refresh_token.is_some(),
        %expires_at,
        "Token response parsed"
    );

    Ok(TokenSet {
        access_token,
        refresh_token,
        expires_at,
    })
}

fn non_empty_str(value: &Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn parse_i64_lossy(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

/// Pull an error code and message out of an error body.
///
/// Handles both the OAuth standard shape (`error`, `error_description`) and
/// Strava's fault shape (`message`, `errors: [{resource, field, code}]`).
fn parse_error_details(body: &str) -> (Option<String>, Option<String>) {
    let Ok(value) = serde_json::from_str::<Value>(body) else {
        return (None, None);
    };

    let message =
        non_empty_str(&value, "error_description").or_else(|| non_empty_str(&value, "message"));

    let code = non_empty_str(&value, "error").or_else(|| {
        value
            .get("errors")
            .and_then(Value::as_array)
            .and_then(|errors| errors.first())
            .map(|first| {
                let field = first.get("field").and_then(Value::as_str).unwrap_or("");
                let code = first.get("code").and_then(Value::as_str).unwrap_or("");
                match (field.is_empty(), code.is_empty()) {
                    (false, false) => format!("{field}:{code}"),
                    (true, false) => code.to_string(),
                    _ => field.to_string(),
                }
            })
            .filter(|c| !c.is_empty())
    });

    (code, message)
}
