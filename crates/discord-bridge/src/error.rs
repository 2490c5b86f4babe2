//! Errors returned by the Discord REST client

use relay_core::BridgeError;
use std::time::Duration;
use thiserror::Error;

/// Result type for Discord API calls
pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// Discord API failure
#[derive(Debug, Error)]
pub enum ApiError {
    /// Token rejected or the bot lacks access to the channel (401/403)
    #[error("Authentication error: {status} {body}")]
    Unauthorized { status: u16, body: String },

    /// Too many requests (429)
    #[error("Rate limited: retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },

    /// Any other non-success status
    #[error("Discord API error: {status} {body}")]
    Status { status: u16, body: String },

    /// Network/HTTP error
    #[error("Network error: {0}")]
    Network(String),

    /// Response body did not decode
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),
}

impl ApiError {
    /// Whether the failure ends the session
    pub fn is_fatal(&self) -> bool {
        matches!(self, ApiError::Unauthorized { .. })
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ApiError::InvalidPayload(err.to_string())
        } else if err.is_timeout() {
            ApiError::Network(format!("Request timed out: {}", err))
        } else if err.is_connect() {
            ApiError::Network(format!("Connection failed: {}", err))
        } else {
            ApiError::Network(err.to_string())
        }
    }
}

impl From<ApiError> for BridgeError {
    fn from(err: ApiError) -> Self {
        BridgeError::Transport(err.to_string())
    }
}
