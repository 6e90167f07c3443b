//! Error types for network operations.

use thiserror::Error;

/// Result type for network operations.
pub type NetResult<T> = Result<T, NetError>;

/// Errors that can occur when talking to the backend.
///
/// The variants carry the retry semantics the rest of the system keys on:
/// an auth failure kills the session, a validation failure kills exactly
/// one action, and everything else may be retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NetError {
    /// The server rejected the credential (401/403). Terminal for the
    /// session; never retried.
    #[error("authorization rejected: {message}")]
    Auth {
        /// Server-provided reason.
        message: String,
    },

    /// The server rejected the request content (other 4xx). Terminal for
    /// the request; retrying would reproduce the same answer.
    #[error("request rejected: {message}")]
    Validation {
        /// Server-provided reason.
        message: String,
    },

    /// The server could not be reached or answered 5xx. Retryable.
    #[error("transient network failure: {message}")]
    Transient {
        /// Description of the failure.
        message: String,
    },

    /// The call exceeded its deadline. Retryable.
    #[error("request timed out")]
    Timeout,

    /// The circuit breaker is open; the call was refused without network
    /// I/O. Retryable once the breaker allows traffic again.
    #[error("circuit breaker open")]
    CircuitOpen,
}

impl NetError {
    /// Creates an authorization error.
    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth {
            message: message.into(),
        }
    }

    /// Creates a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Creates a transient error.
    pub fn transient(message: impl Into<String>) -> Self {
        Self::Transient {
            message: message.into(),
        }
    }

    /// Returns `true` if the operation may be retried later.
    ///
    /// Retryable failures are the "indeterminate" outcomes: the server may
    /// or may not have seen the request.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            NetError::Transient { .. } | NetError::Timeout | NetError::CircuitOpen
        )
    }

    /// Returns `true` if the error invalidates the session.
    #[must_use]
    pub fn is_auth(&self) -> bool {
        matches!(self, NetError::Auth { .. })
    }

    /// Returns `true` if the server definitively rejected the request.
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(self, NetError::Validation { .. })
    }

    /// Returns `true` if the failure should count against the circuit
    /// breaker.
    ///
    /// A 4xx answer proves the server is alive, so only connectivity-class
    /// failures count.
    #[must_use]
    pub fn counts_as_breaker_failure(&self) -> bool {
        matches!(self, NetError::Transient { .. } | NetError::Timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_classification() {
        assert!(NetError::transient("connection refused").is_retryable());
        assert!(NetError::Timeout.is_retryable());
        assert!(NetError::CircuitOpen.is_retryable());
        assert!(!NetError::auth("expired token").is_retryable());
        assert!(!NetError::validation("title too long").is_retryable());
    }

    #[test]
    fn breaker_accounting() {
        assert!(NetError::transient("dns failure").counts_as_breaker_failure());
        assert!(NetError::Timeout.counts_as_breaker_failure());
        // Fast-fails never re-count against the breaker
        assert!(!NetError::CircuitOpen.counts_as_breaker_failure());
        // 4xx answers prove the server is up
        assert!(!NetError::auth("expired").counts_as_breaker_failure());
        assert!(!NetError::validation("bad body").counts_as_breaker_failure());
    }

    #[test]
    fn error_display() {
        let err = NetError::auth("token expired");
        assert!(err.to_string().contains("token expired"));

        assert_eq!(NetError::Timeout.to_string(), "request timed out");
        assert_eq!(NetError::CircuitOpen.to_string(), "circuit breaker open");
    }
}
