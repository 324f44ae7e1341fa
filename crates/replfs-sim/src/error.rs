//! Simulator error types.

use replfs_client::ClientError;
use replfs_net::NetError;
use replfs_server::ServerError;
use thiserror::Error;

/// Result type for simulator setup and direct injection.
pub type SimResult<T> = Result<T, SimError>;

#[derive(Debug, Error)]
pub enum SimError {
    #[error("failed to create the simulation root: {0}")]
    Io(#[from] std::io::Error),

    #[error("replica error: {0}")]
    Server(#[from] ServerError),

    #[error("network error: {0}")]
    Net(#[from] NetError),

    #[error("coordinator error: {0}")]
    Client(#[from] ClientError),

    #[error("no replica at index {index} (cluster has {len})")]
    NoSuchReplica { index: usize, len: usize },
}
