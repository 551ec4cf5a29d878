//! Error types for upload-tracker
//!
//! Every failed upload surfaces to its caller as one of these variants. The
//! registry itself never fails: operations on unknown or already-removed
//! records are silently ignored, so only the transport and configuration
//! layers produce errors.

use thiserror::Error;

/// Result type alias for upload-tracker operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for upload-tracker
#[derive(Debug, Error)]
pub enum Error {
    /// No response was obtained from the server (connection refused, reset,
    /// DNS failure, unreadable response body, ...)
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The server answered with a non-success HTTP status
    #[error("server returned status {status}: {body}")]
    Server {
        /// HTTP status code of the final response
        status: u16,
        /// Response body, treated as a plain-text error message
        body: String,
    },

    /// The caller cancelled the upload before it finished
    #[error("upload cancelled")]
    Cancelled,

    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "base_url")
        key: Option<String>,
    },

    /// Destination could not be turned into a request URL
    #[error("invalid upload destination: {0}")]
    InvalidDestination(String),

    /// I/O error (reading a local file to upload, loading a config file)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Machine-readable error code, stable across releases
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::Network(_) => "network_error",
            Error::Server { .. } => "server_error",
            Error::Cancelled => "cancelled",
            Error::Config { .. } => "config_error",
            Error::InvalidDestination(_) => "invalid_destination",
            Error::Io(_) => "io_error",
            Error::Serialization(_) => "serialization_error",
            Error::Other(_) => "internal_error",
        }
    }

    /// HTTP status of the server response, if the failure came from one
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Server { status, .. } => Some(*status),
            Error::Network(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Whether the error was caused by the caller rather than by the network or server
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }
}
