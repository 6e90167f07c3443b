//! Error types for the client facade.

use syncline_engine::EngineError;
use syncline_session::SessionError;
use thiserror::Error;

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors surfaced by the client facade.
#[derive(Error, Debug)]
pub enum ClientError {
    /// The operation requires an active session.
    #[error("not signed in")]
    NotAuthenticated,

    /// A session-layer failure.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// An engine-layer failure.
    #[error(transparent)]
    Engine(#[from] EngineError),
}

impl ClientError {
    /// Returns `true` if this error ended the session.
    #[must_use]
    pub fn is_auth(&self) -> bool {
        match self {
            Self::NotAuthenticated => false,
            Self::Session(e) => e.is_terminal(),
            Self::Engine(e) => e.is_auth(),
        }
    }
}
