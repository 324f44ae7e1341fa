//! I/O error types.

use std::path::PathBuf;

/// Result type for backend operations.
pub type IoResult<T> = Result<T, IoError>;

/// Errors from the I/O backend.
#[derive(Debug, thiserror::Error)]
pub enum IoError {
    /// Underlying OS I/O error.
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// Opening a path failed.
    #[error("cannot open {path}: {source}")]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The handle was already closed.
    #[error("invalid file handle: {handle}")]
    InvalidHandle { handle: u64 },
}
