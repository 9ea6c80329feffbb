//! Errors for calls against the platform REST API.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("No access token available, the operation is cancelled")]
    NoAuth,
    #[error("{endpoint} is still rate limited after waiting")]
    RateLimited { endpoint: String },
    #[error("{endpoint} returned HTTP {status}: {body}")]
    Http {
        endpoint: String,
        status: u16,
        body: String,
    },
    #[error("The API returned an error: {message}")]
    Remote { message: String },
    #[error("{endpoint} request failed: {message}")]
    Transport { endpoint: String, message: String },
    #[error("Upload {tracking_id} not finished after {attempts} status checks (status={last_status:?}, error={last_error:?})")]
    Timeout {
        tracking_id: u64,
        attempts: u32,
        last_status: Option<String>,
        last_error: Option<String>,
    },
    #[error("Cannot read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Operation cancelled")]
    Cancelled,
}

impl ApiError {
    pub(crate) fn transport(endpoint: &str, message: impl std::fmt::Display) -> Self {
        Self::Transport {
            endpoint: endpoint.to_string(),
            message: message.to_string(),
        }
    }
}
