//! Error types for pock-core

use thiserror::Error;

/// Result type alias using pock-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in pock-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Remote collection or storage could not be reached
    #[error("Transport error: {0}")]
    Transport(String),

    /// The remote collection rejected a stale or malformed cursor
    #[error("Invalid cursor: {0}")]
    InvalidCursor(String),

    /// Database error
    #[error("Database error: {0}")]
    Database(String),

    /// libSQL error
    #[error("libSQL error: {0}")]
    LibSql(#[from] libsql::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Item not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// No signed-in user for an operation that needs one
    #[error("No user is signed in")]
    NotSignedIn,

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Book/object storage error
    #[error("Storage error: {0}")]
    Storage(String),

    /// Keychain or session store error
    #[error("Secure storage error: {0}")]
    SecureStorage(String),
}

impl Error {
    /// Whether the failed operation can be retried as-is.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_))
    }

    /// Whether the only way forward is a full refresh of the paged window.
    #[must_use]
    pub const fn requires_refresh(&self) -> bool {
        matches!(self, Self::InvalidCursor(_))
    }
}
