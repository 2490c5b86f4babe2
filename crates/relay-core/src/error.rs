//! Error types for the relay bridge

use crate::event::Endpoint;
use thiserror::Error;

/// Result type for relay operations
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Relay error types
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Adapter could not establish its transport
    #[error("Connection error: {0}")]
    Connection(String),

    /// Command issued outside the adapter's connected window
    #[error("{0} endpoint is not connected")]
    NotConnected(Endpoint),

    /// Non-fatal runtime error reported by an adapter
    #[error("Transport error: {0}")]
    Transport(String),

    /// Adapter stream ended without an explicit stop
    #[error("{0} endpoint disconnected unexpectedly")]
    UnexpectedDisconnect(Endpoint),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Peer sent something the protocol does not allow
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Invalid adapter configuration
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<serde_json::Error> for BridgeError {
    fn from(err: serde_json::Error) -> Self {
        BridgeError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_names_endpoint() {
        let err = BridgeError::NotConnected(Endpoint::Chat);
        assert_eq!(err.to_string(), "Chat endpoint is not connected");

        let err = BridgeError::UnexpectedDisconnect(Endpoint::Game);
        assert_eq!(err.to_string(), "Game endpoint disconnected unexpectedly");
    }

    #[test]
    fn test_from_serde_json() {
        let err: BridgeError = serde_json::from_str::<u32>("nope").unwrap_err().into();
        assert!(matches!(err, BridgeError::Serialization(_)));
    }
}
