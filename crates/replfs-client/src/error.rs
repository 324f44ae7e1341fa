//! Client error types.

use replfs_net::NetError;
use replfs_types::{
    FileDescriptor, MAX_BLOCK_LENGTH, MAX_FILE_LENGTH, MAX_FILE_NAME_LENGTH, MAX_WRITES,
    TransactionId,
};
use thiserror::Error;

/// Result type for coordinator operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors returned by [`Coordinator`](crate::Coordinator) operations.
///
/// Limit violations are detected locally and never cause network traffic.
/// Quorum failures are reported after the retry ceiling is reached.
#[derive(Debug, Error)]
pub enum ClientError {
    // ------------------------------------------------------------------------
    // Resource limits
    // ------------------------------------------------------------------------
    #[error("a file is already open")]
    FileAlreadyOpen,

    #[error("no file is open")]
    NoFileOpen,

    #[error("bad file descriptor {given} (open file is {open})")]
    BadDescriptor {
        given: FileDescriptor,
        open: FileDescriptor,
    },

    #[error("file name is {len} bytes (max {max})", max = MAX_FILE_NAME_LENGTH)]
    PathTooLong { len: usize },

    #[error("file name {file_name:?} contains a NUL byte")]
    NulInFileName { file_name: String },

    #[error("{max} writes already staged; commit or abort first", max = MAX_WRITES)]
    TooManyWrites,

    #[error("block of {len} bytes exceeds {max}", max = MAX_BLOCK_LENGTH)]
    BlockTooLarge { len: usize },

    #[error("write ending at byte {end} exceeds the {max}-byte file limit", max = MAX_FILE_LENGTH)]
    FileTooLarge { end: u64 },

    // ------------------------------------------------------------------------
    // Quorum failures
    // ------------------------------------------------------------------------
    #[error("expected {expected} replicas, found {found}")]
    MemberCountMismatch { expected: usize, found: usize },

    #[error("replicas did not agree on a descriptor for {file_name}")]
    OpenNotAgreed { file_name: String },

    #[error("transaction {transaction} was not unanimously accepted and has been aborted")]
    VoteFailed { transaction: TransactionId },

    #[error("transaction {transaction} committed on {acknowledged} of {expected} replicas")]
    CommitIncomplete {
        transaction: TransactionId,
        acknowledged: usize,
        expected: usize,
    },

    #[error("abort confirmed by {confirmed} of {expected} replicas")]
    AbortIncomplete { confirmed: usize, expected: usize },

    #[error("close confirmed by {confirmed} of {expected} replicas")]
    CloseIncomplete { confirmed: usize, expected: usize },

    // ------------------------------------------------------------------------
    // Fatal
    // ------------------------------------------------------------------------
    #[error("network error: {0}")]
    Net(#[from] NetError),
}
