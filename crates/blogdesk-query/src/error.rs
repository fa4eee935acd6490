//! Error types for list reads

use thiserror::Error;

/// Result type alias for list reads
pub type FetchResult<T> = Result<T, FetchError>;

/// Everything a list read can publish as its error state
///
/// Cloneable so every waiter on a de-duplicated request receives the same
/// failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// Network unreachable, connection reset, DNS failure
    #[error("Request failed: {message}")]
    Transport {
        /// Error message
        message: String,
    },

    /// The request did not complete in time
    #[error("Request timed out after {millis}ms")]
    Timeout {
        /// Timeout duration
        millis: u64,
    },

    /// The API rejected the session token (HTTP 401)
    #[error("Session expired: {message}")]
    SessionExpired {
        /// Error message
        message: String,
    },

    /// The API answered with a non-success status
    #[error("API returned {status}: {message}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Message taken from the response body
        message: String,
    },

    /// The response body did not match the list envelope
    #[error("Unexpected response: {message}")]
    Decode {
        /// Error message
        message: String,
    },

    /// The query could not be turned into request parameters
    #[error("Invalid query: {field} - {message}")]
    InvalidQuery {
        /// Offending parameter
        field: String,
        /// Error message
        message: String,
    },
}

impl FetchError {
    /// Create a transport error
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Create a decode error
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    /// Whether another attempt could plausibly succeed
    ///
    /// Transport failures, timeouts and server-side (5xx) errors are retried;
    /// client errors, expired sessions and malformed bodies are terminal.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Transport { .. } | Self::Timeout { .. } => true,
            Self::Status { status, .. } => *status >= 500,
            Self::SessionExpired { .. } | Self::Decode { .. } | Self::InvalidQuery { .. } => false,
        }
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(err: serde_json::Error) -> Self {
        Self::decode(err.to_string())
    }
}

impl From<blogdesk_core::Error> for FetchError {
    fn from(err: blogdesk_core::Error) -> Self {
        use blogdesk_core::Error as CoreError;

        match err {
            CoreError::Authentication(message) => Self::SessionExpired { message },
            CoreError::Http { status: 401, message } => Self::SessionExpired { message },
            CoreError::Http { status, message } => Self::Status { status, message },
            CoreError::Transport(message) => Self::Transport { message },
            CoreError::Timeout { duration_ms } => Self::Timeout {
                millis: duration_ms,
            },
            CoreError::Validation { field, message } => Self::InvalidQuery { field, message },
            CoreError::Serialization(err) => Self::from(err),
            other => Self::transport(other.to_string()),
        }
    }
}
