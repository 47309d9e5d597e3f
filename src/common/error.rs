//! Error types for the control link
//!
//! Transport errors are reported to callers of `send` and otherwise surface
//! as connection state changes; router errors stay contained per message.

use std::io;
use std::time::Duration;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the control link
#[derive(Error, Debug)]
pub enum Error {
    // === Connection Errors ===
    #[error("Control socket not reachable at {path} after {waited:?}. Is the supervisor running?")]
    ConnectTimeout { path: String, waited: Duration },

    #[error("Connection was cancelled by disconnect()")]
    ConnectionCancelled,

    #[error("Failed to write frame: {0}")]
    Send(#[source] io::Error),

    #[error("Outbound queue full; oldest pending frame dropped")]
    QueueOverflow,

    #[error("Frame contains an embedded newline delimiter")]
    InvalidFrame,

    // === Protocol Errors ===
    #[error("Malformed control frame: {0}")]
    MalformedFrame(String),

    // === Routing Errors ===
    #[error("No handler registered for category: {0}")]
    NoHandler(String),

    #[error("Handler for '{category}' failed: {message}")]
    Handler { category: String, message: String },

    #[error("Peer rejected {category}/{action}: {message}")]
    Remote {
        category: String,
        action: String,
        message: String,
    },

    #[error("Request {id} got no response within {waited:?}")]
    RequestTimeout { id: String, waited: Duration },

    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    // === Configuration Errors ===
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration file: {0}")]
    ConfigParse(String),

    // === IO Errors ===
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to read file '{path}': {error}")]
    FileRead { path: String, error: String },

    // === Serialization Errors ===
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // === Internal Errors ===
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a handler failure error
    pub fn handler(category: &str, message: impl Into<String>) -> Self {
        Self::Handler {
            category: category.to_string(),
            message: message.into(),
        }
    }

    /// Create a remote (peer-reported) error
    pub fn remote(category: &str, action: &str, message: &str) -> Self {
        Self::Remote {
            category: category.to_string(),
            action: action.to_string(),
            message: message.to_string(),
        }
    }

    /// Whether this error came from the transport rather than the protocol
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::ConnectTimeout { .. }
                | Self::ConnectionCancelled
                | Self::Send(_)
                | Self::QueueOverflow
                | Self::InvalidFrame
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_handler_message() {
        let err = Error::NoHandler("screencap".to_string());
        assert_eq!(err.to_string(), "No handler registered for category: screencap");
    }

    #[test]
    fn test_connection_error_classification() {
        assert!(Error::ConnectionCancelled.is_connection_error());
        assert!(Error::Send(io::Error::from(io::ErrorKind::BrokenPipe)).is_connection_error());
        assert!(!Error::MalformedFrame("eof".to_string()).is_connection_error());
        assert!(!Error::handler("terminal", "boom").is_connection_error());
    }
}
