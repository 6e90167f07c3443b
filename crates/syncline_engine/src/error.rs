//! Error types for the sync engine.

use syncline_net::NetError;
use syncline_proto::ActionId;
use syncline_store::StoreError;
use thiserror::Error;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors that can occur in the sync engine.
#[derive(Error, Debug)]
pub enum EngineError {
    /// The server definitively rejected a mutation. The optimistic update
    /// has already been rolled back when this surfaces.
    #[error("mutation rejected: {message}")]
    Rejected {
        /// Server-provided reason.
        message: String,
    },

    /// The server rejected the bearer token. The caller must end the
    /// session.
    #[error("authorization rejected: {message}")]
    Unauthorized {
        /// Server-provided reason.
        message: String,
    },

    /// The server could not be reached and the operation had no queue to
    /// fall back on.
    #[error("network failure: {message}")]
    Network {
        /// Underlying failure description.
        message: String,
    },

    /// No pending action with this ID exists.
    #[error("unknown action: {0}")]
    UnknownAction(ActionId),

    /// The durable mirror could not be read or written.
    #[error("engine storage failed: {0}")]
    Storage(#[from] StoreError),
}

impl EngineError {
    /// Creates a rejected-mutation error.
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected {
            message: message.into(),
        }
    }

    /// Returns `true` when the caller should end the session.
    #[must_use]
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Unauthorized { .. })
    }
}

impl From<NetError> for EngineError {
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
