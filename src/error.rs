//! Error handling for the Schulte mining client
//!
//! Every failure in the client degrades to a visible status message and a
//! retry path, so the variants below are grouped by how the caller recovers
//! from them rather than by where they happened.

use thiserror::Error;

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the mining client
#[derive(Error, Debug)]
pub enum Error {
    /// Transport-level failures (connect, timeout, body read)
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML configuration parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Non-success status from the authority. `reason` is the `error` field
    /// recovered from the body, or `HTTP <status>` when none was usable.
    #[error("{reason}")]
    Api { status: u16, reason: String },

    /// Response or puzzle that does not match the expected contract
    #[error("Protocol mismatch: {message}")]
    Protocol { message: String },

    /// Unparseable terminal command
    #[error("Invalid command: {message}")]
    InvalidCommand { message: String },
}

impl Error {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an API error from a status code and recovered reason
    pub fn api(status: u16, reason: impl Into<String>) -> Self {
        Self::Api {
            status,
            reason: reason.into(),
        }
    }

    /// Create a protocol mismatch error
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Create an invalid command error
    pub fn invalid_command(message: impl Into<String>) -> Self {
        Self::InvalidCommand {
            message: message.into(),
        }
    }


    /// Check if a read may be retried automatically.
    ///
    /// Submissions are never retried regardless of this answer.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Http(e) => {
                if let Some(status) = e.status() {
                    status.is_server_error() || status == reqwest::StatusCode::TOO_MANY_REQUESTS
                } else {
                    e.is_timeout() || e.is_connect()
                }
            }
            Error::Api { status, .. } => *status >= 500 || *status == 429,
            Error::Io(_) => true,
            _ => false,
        }
    }

    /// Get error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            Error::Http(_) => "http",
            Error::Json(_) => "json",
            Error::Yaml(_) => "yaml",
            Error::Io(_) => "io",
            Error::Config { .. } => "config",
            Error::Api { .. } => "api",
            Error::Protocol { .. } => "protocol",
            Error::InvalidCommand { .. } => "invalid_command",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_displays_reason_verbatim() {
        let err = Error::api(400, "you need to join the pool first");
        assert_eq!(err.to_string(), "you need to join the pool first");
        assert_eq!(err.category(), "api");
    }

    #[test]
    fn test_retryable_classification() {
        assert!(Error::api(503, "HTTP 503").is_retryable());
        assert!(Error::api(429, "HTTP 429").is_retryable());
        assert!(!Error::api(400, "bad request").is_retryable());
        assert!(!Error::protocol("unknown puzzle").is_retryable());
        assert!(!Error::config("bad").is_retryable());
    }

    #[test]
    fn test_error_conversions() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));

        let json_err = serde_json::from_str::<String>("invalid").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::Json(_)));
        assert_eq!(err.category(), "json");
    }
}
