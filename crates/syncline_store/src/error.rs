//! Error types for store operations.

use std::io;
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur in the persistent store adapter.
#[derive(Debug, Error)]
pub enum StoreError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A stored payload could not be decoded.
    #[error("corrupted payload in slot '{slot}': {message}")]
    Corrupted {
        /// The slot or record key that held the payload.
        slot: String,
        /// Description of the decode failure.
        message: String,
    },

    /// A key or namespace contains characters the backend cannot map to a
    /// storage location.
    #[error("invalid store key: '{key}'")]
    InvalidKey {
        /// The offending key.
        key: String,
    },

    /// Encoding a payload for storage failed.
    #[error("encode error: {0}")]
    Encode(String),
}

impl StoreError {
    /// Creates a corrupted-payload error.
    pub fn corrupted(slot: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Corrupted {
            slot: slot.into(),
            message: message.into(),
        }
    }

    /// Creates an invalid-key error.
    pub fn invalid_key(key: impl Into<String>) -> Self {
        Self::InvalidKey { key: key.into() }
    }

    /// Creates an encode error.
    pub fn encode(message: impl Into<String>) -> Self {
        Self::Encode(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = StoreError::corrupted("session", "truncated");
        assert!(err.to_string().contains("session"));
        assert!(err.to_string().contains("truncated"));

        let err = StoreError::invalid_key("../etc");
        assert!(err.to_string().contains("../etc"));
    }
}
