//! Channel error types.

use replfs_wire::WireError;

/// Result type for channel operations.
pub type NetResult<T> = Result<T, NetError>;

/// Errors that end a process's use of the channel.
///
/// Lost datagrams are not errors; only socket failures and packets this
/// process could not encode are.
#[derive(Debug, thiserror::Error)]
pub enum NetError {
    #[error("socket error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cannot encode outbound packet: {0}")]
    Encode(#[from] WireError),
}
