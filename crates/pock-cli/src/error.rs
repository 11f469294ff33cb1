use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] pock_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Book ID cannot be empty")]
    EmptyBookId,
    #[error("Invalid book ID: {0}")]
    InvalidBookId(String),
    #[error("Book not found: {0}")]
    BookNotFound(String),
    #[error("Nothing to save: pass --location and/or --percentage")]
    EmptyProgress,
    #[error("Upload failed: {0}")]
    UploadFailed(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Not signed in. Run `pock auth login` first.")]
    NotSignedIn,
}
