//! Error types for broker API calls.
//!
//! Errors are categorized by HTTP status so callers can decide what to
//! retry without matching on messages.

use thiserror::Error;

/// Categories of broker API errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// The broker or user does not exist (404)
    NotFound,
    /// Request was rejected as malformed or invalid (400)
    BadRequest,
    /// Caller lacks permission (401, 403)
    Forbidden,
    /// Concurrent modification or duplicate (409)
    Conflict,
    /// Rate limited (429)
    Throttled,
    /// Service temporarily unavailable or failing (5xx)
    Unavailable,
    /// Anything else
    Other,
}

impl ErrorCategory {
    /// Whether this category is typically transient and worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Throttled | Self::Unavailable)
    }

    /// Get a user-friendly description of this error category.
    pub fn description(&self) -> &'static str {
        match self {
            Self::NotFound => "Resource not found",
            Self::BadRequest => "Invalid request",
            Self::Forbidden => "Access denied",
            Self::Conflict => "Conflicting modification",
            Self::Throttled => "Request rate exceeded",
            Self::Unavailable => "Service unavailable",
            Self::Other => "Unexpected error",
        }
    }
}

/// Errors returned by broker API calls.
#[derive(Debug, Error)]
pub enum Error {
    /// Broker or user not found
    #[error("not found: {message}")]
    NotFound {
        /// Message from the service
        message: String,
    },

    /// Request failed validation
    #[error("bad request: {message}")]
    BadRequest {
        /// Message from the service
        message: String,
        /// Attribute the service rejected, if named
        attribute: Option<String>,
    },

    /// Authentication or authorization failure
    #[error("forbidden: {message}")]
    Forbidden {
        /// Message from the service
        message: String,
    },

    /// Concurrent modification, or the user already exists
    #[error("conflict: {message}")]
    Conflict {
        /// Message from the service
        message: String,
    },

    /// Rate limited
    #[error("too many requests: {message}")]
    TooManyRequests {
        /// Message from the service
        message: String,
    },

    /// Service unavailable
    #[error("service unavailable: {message}")]
    Unavailable {
        /// Message from the service
        message: String,
    },

    /// Internal service failure
    #[error("internal server error: {message}")]
    InternalServerError {
        /// Message from the service
        message: String,
    },

    /// Unrecognized status
    #[error("unexpected status {status}: {message}")]
    Other {
        /// HTTP status code
        status: u16,
        /// Message from the service
        message: String,
    },
}

impl Error {
    /// Build an error from an HTTP status and message.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            400 => Error::BadRequest {
                message,
                attribute: None,
            },
            401 | 403 => Error::Forbidden { message },
            404 => Error::NotFound { message },
            409 => Error::Conflict { message },
            429 => Error::TooManyRequests { message },
            503 => Error::Unavailable { message },
            500..=599 => Error::InternalServerError { message },
            _ => Error::Other { status, message },
        }
    }

    /// Get the error category for retry logic.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::NotFound { .. } => ErrorCategory::NotFound,
            Error::BadRequest { .. } => ErrorCategory::BadRequest,
            Error::Forbidden { .. } => ErrorCategory::Forbidden,
            Error::Conflict { .. } => ErrorCategory::Conflict,
            Error::TooManyRequests { .. } => ErrorCategory::Throttled,
            Error::Unavailable { .. } | Error::InternalServerError { .. } => {
                ErrorCategory::Unavailable
            }
            Error::Other { .. } => ErrorCategory::Other,
        }
    }

    /// Whether the broker or user does not exist.
    pub fn is_not_found(&self) -> bool {
        self.category() == ErrorCategory::NotFound
    }

    /// Whether this error is typically transient and worth retrying.
    pub fn is_retryable(&self) -> bool {
        self.category().is_retryable()
    }
}

/// Result type for broker API calls.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_status_categories() {
        assert_eq!(Error::from_status(404, "x").category(), ErrorCategory::NotFound);
        assert_eq!(Error::from_status(400, "x").category(), ErrorCategory::BadRequest);
        assert_eq!(Error::from_status(401, "x").category(), ErrorCategory::Forbidden);
        assert_eq!(Error::from_status(403, "x").category(), ErrorCategory::Forbidden);
        assert_eq!(Error::from_status(409, "x").category(), ErrorCategory::Conflict);
        assert_eq!(Error::from_status(429, "x").category(), ErrorCategory::Throttled);
        assert_eq!(Error::from_status(500, "x").category(), ErrorCategory::Unavailable);
        assert_eq!(Error::from_status(503, "x").category(), ErrorCategory::Unavailable);
        assert_eq!(Error::from_status(418, "x").category(), ErrorCategory::Other);
    }

    #[test]
    fn test_retryable() {
        assert!(Error::from_status(429, "slow down").is_retryable());
        assert!(Error::from_status(503, "busy").is_retryable());
        assert!(!Error::from_status(409, "busy").is_retryable());
        assert!(!Error::from_status(403, "denied").is_retryable());
    }

    #[test]
    fn test_display_includes_message() {
        let err = Error::from_status(404, "Can't find requested broker [b-1]");
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "not found: Can't find requested broker [b-1]");
        let err = Error::from_status(418, "teapot");
        assert_eq!(err.to_string(), "unexpected status 418: teapot");
    }
}
