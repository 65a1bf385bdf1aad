//! Error types for the storefront engine.

use thiserror::Error;

/// All possible errors from the storefront engine.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    // Storage errors
    #[error("corrupt entry under key '{key}': {reason}")]
    CorruptEntry { key: String, reason: String },

    #[error("storage error: {0}")]
    Storage(String),

    #[error("serialization failed: {0}")]
    Serialization(String),

    // Protocol errors
    #[error("unknown message: {0}")]
    UnknownMessage(String),

    // Payload errors
    #[error("invalid payload for {kind}: {reason}")]
    InvalidPayload { kind: String, reason: String },
}

impl Error {
    /// Whether this error came from unreadable persisted data.
    pub fn is_corrupt(&self) -> bool {
        matches!(self, Error::CorruptEntry { .. })
    }
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;
