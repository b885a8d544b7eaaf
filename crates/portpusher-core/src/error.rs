//! Error types for the port pusher
//!
//! This module defines all error types used throughout the workspace.

use thiserror::Error;

/// Result type alias for port pusher operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the port pusher
#[derive(Error, Debug)]
pub enum Error {
    /// The sidecar is reachable but has no usable forwarded port
    #[error("Forwarded port unavailable: {0}")]
    Unavailable(String),

    /// Configuration errors (startup only)
    #[error("Configuration error: {0}")]
    Config(String),

    /// HTTP client errors
    #[error("HTTP error: {0}")]
    Http(String),

    /// Request timed out at the transport layer
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// Remote end refused or dropped the connection
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// A step received a status code other than the one it requires
    #[error("{step} failed, got HTTP {status}")]
    UnexpectedStatus {
        /// Name of the step that issued the request
        step: String,
        /// HTTP status code received
        status: u16,
    },

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Response had the wrong shape
    #[error("Decode error: {0}")]
    Decode(String),

    /// Response violated the request/response protocol (e.g. id mismatch)
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Application-level error object returned by an RPC endpoint
    #[error("RPC error {code}: {message}")]
    Rpc {
        /// Error code reported by the backend
        code: i64,
        /// Error message reported by the backend
        message: String,
    },

    /// Authentication errors
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Session handshake errors
    #[error("Handshake failed: {0}")]
    Handshake(String),

    /// The daemon-connection backend reported no hosts at all
    #[error("no hosts to connect to")]
    NoHosts,

    /// The daemon-connection backend has hosts but none is online
    #[error("no online hosts found")]
    NoOnlineHosts,

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an "unavailable" error
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an HTTP error
    pub fn http(msg: impl Into<String>) -> Self {
        Self::Http(msg.into())
    }

    /// Create an unexpected status error for a named step
    pub fn status(step: impl Into<String>, status: u16) -> Self {
        Self::UnexpectedStatus {
            step: step.into(),
            status,
        }
    }

    /// Create a decode error
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    /// Create a protocol error
    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    /// Create an RPC error
    pub fn rpc(code: i64, message: impl Into<String>) -> Self {
        Self::Rpc {
            code,
            message: message.into(),
        }
    }

    /// Create an authentication error
    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Authentication(msg.into())
    }

    /// Create a handshake error
    pub fn handshake(msg: impl Into<String>) -> Self {
        Self::Handshake(msg.into())
    }

    /// Whether this error came from the transport rather than the backend itself
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::Http(_)
                | Self::Timeout(_)
                | Self::ConnectionFailed(_)
                | Self::UnexpectedStatus { .. }
        )
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err.to_string())
        } else if err.is_connect() {
            Self::ConnectionFailed(err.to_string())
        } else if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Http(err.to_string())
        }
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_error_names_step() {
        let err = Error::status("login", 403);
        assert_eq!(err.to_string(), "login failed, got HTTP 403");
        assert!(err.is_transport());
    }

    #[test]
    fn test_domain_errors_are_not_transport() {
        assert!(!Error::NoHosts.is_transport());
        assert!(!Error::rpc(1, "Not authenticated").is_transport());
        assert_eq!(Error::NoOnlineHosts.to_string(), "no online hosts found");
    }
}
