//! Server error types.

use std::path::PathBuf;

use replfs_io::IoError;
use replfs_net::NetError;
use thiserror::Error;

/// Result type for replica operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Errors that stop a replica.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Another replica on this host already owns the mount directory.
    #[error("mount directory {path} already exists; machine already in use")]
    MountInUse { path: PathBuf },

    /// Local file I/O failed.
    #[error("i/o error: {0}")]
    Io(#[from] IoError),

    /// The channel failed.
    #[error("network error: {0}")]
    Net(#[from] NetError),
}

impl From<std::io::Error> for ServerError {
    fn from(error: std::io::Error) -> Self {
        Self::Io(IoError::from(error))
    }
}
