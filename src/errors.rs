//! Unified error types for `billdesk`.
//!
//! [`ApiError`] covers everything that can go wrong talking to the billing
//! backend. It is `Clone` because one failed request is handed to every caller
//! that was waiting on the same cache key. [`Error`] is the crate-wide error
//! that wraps it alongside configuration, validation and storage failures.

use thiserror::Error;

/// Failures of a single backend request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// The request never produced an HTTP response (DNS, connect, reset)
    #[error("network error: {message}")]
    Transport {
        /// Description from the transport layer
        message: String,
    },

    /// The transport gave up waiting for a response
    #[error("request timed out")]
    Timeout,

    /// The backend answered with a non-success status
    #[error("server rejected request ({status}): {message}")]
    Server {
        /// HTTP status code
        status: u16,
        /// Human-readable message taken from the error body
        message: String,
    },

    /// The response body did not match the expected shape
    #[error("malformed response from {path}: {message}")]
    MalformedResponse {
        /// Request path that produced the body
        path: String,
        /// Decoder message
        message: String,
    },

    /// A write that must not be duplicated was issued without a token
    #[error("{operation} requires an idempotency key")]
    MissingIdempotencyKey {
        /// Name of the write operation
        operation: String,
    },
}

impl ApiError {
    /// Returns true if the error is transient and the request may be retried.
    #[must_use]
    pub const fn should_retry(&self) -> bool {
        match self {
            Self::Transport { .. } | Self::Timeout => true,
            Self::Server { status, .. } => *status == 429 || *status >= 500,
            Self::MalformedResponse { .. } | Self::MissingIdempotencyKey { .. } => false,
        }
    }

    /// Status code for server rejections, `None` for everything else.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Server { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Crate-wide error type.
#[derive(Debug, Error)]
pub enum Error {
    /// Bad or missing configuration
    #[error("Configuration error: {message}")]
    Config {
        /// What was wrong
        message: String,
    },

    /// Locally detected input problem; never sent to the server
    #[error("Validation error: {message}")]
    Validation {
        /// User-facing message
        message: String,
    },

    /// Backend request failed
    #[error(transparent)]
    Api(#[from] ApiError),

    /// Local preference database failure
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// A request body could not be encoded
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// File system failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Shorthand for a [`Error::Validation`] with the given message.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }
}

/// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(ApiError::Timeout.should_retry());
        assert!(
            ApiError::Transport {
                message: "connection reset".to_string()
            }
            .should_retry()
        );
        assert!(
            ApiError::Server {
                status: 503,
                message: "unavailable".to_string()
            }
            .should_retry()
        );
        assert!(
            ApiError::Server {
                status: 429,
                message: "slow down".to_string()
            }
            .should_retry()
        );
        assert!(
            !ApiError::Server {
                status: 422,
                message: "Invoice already finalized".to_string()
            }
            .should_retry()
        );
        assert!(
            !ApiError::MalformedResponse {
                path: "/invoices".to_string(),
                message: "missing field `data`".to_string()
            }
            .should_retry()
        );
    }

    #[test]
    fn test_server_message_is_user_facing() {
        let err: Error = ApiError::Server {
            status: 409,
            message: "Insufficient stock for Widget".to_string(),
        }
        .into();
        assert_eq!(
            err.to_string(),
            "server rejected request (409): Insufficient stock for Widget"
        );
    }
}
