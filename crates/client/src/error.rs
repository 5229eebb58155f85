//! Client error types.

use reqwest::StatusCode;
use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by client operations.
///
/// Every variant aborts the operation that produced it; no partial result is
/// returned alongside an error.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("source file not found: {}", .0.display())]
    NotFoundLocal(PathBuf),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("block transfer failed for {digest} ({status})")]
    Transfer { digest: String, status: StatusCode },

    #[error("commit rejected ({status}): {body}")]
    Commit { status: StatusCode, body: String },

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("file info request failed ({status})")]
    Metadata { status: StatusCode },

    #[error("download failed ({status})")]
    Download { status: StatusCode },

    #[error("token request failed ({status})")]
    Token { status: StatusCode },

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Core(#[from] stash_core::Error),
}

/// Result type for client operations.
pub type ClientResult<T> = std::result::Result<T, ClientError>;
