//! Error types for the session layer.

use syncline_net::NetError;
use syncline_store::StoreError;
use thiserror::Error;

/// Result type for session operations.
pub type SessionResult<T> = Result<T, SessionError>;

/// Errors that can occur in the session layer.
#[derive(Error, Debug)]
pub enum SessionError {
    /// No session is currently active.
    #[error("not signed in")]
    NotAuthenticated,

    /// The server rejected the credentials or token. Terminal for the
    /// session that issued the call.
    #[error("authorization rejected: {message}")]
    Unauthorized {
        /// Server-provided reason.
        message: String,
    },

    /// The login or refresh request was malformed.
    #[error("request rejected: {message}")]
    Rejected {
        /// Server-provided reason.
        message: String,
    },

    /// The server could not be reached. The current session, if any,
    /// stays valid.
    #[error("network failure: {message}")]
    Network {
        /// Underlying failure description.
        message: String,
    },

    /// The durable session slot could not be read or written.
    #[error("session storage failed: {0}")]
    Storage(#[from] StoreError),
}

impl SessionError {
    /// Creates an unauthorized error.
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized {
            message: message.into(),
        }
    }

    /// Returns `true` if this error ends the session.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Unauthorized { .. })
    }
}

impl From<NetError> for SessionError {
    fn from(error: NetError) -> Self {
        match error {
            NetError::Auth { message } => Self::Unauthorized { message },
            NetError::Validation { message } => Self::Rejected { message },
            other => Self::Network {
                message: other.to_string(),
            },
        }
    }
}
