//! Wire protocol error types.

use replfs_types::Identity;
use thiserror::Error;

/// Result type for wire protocol operations.
pub type WireResult<T> = Result<T, WireError>;

/// Errors that can occur while encoding or validating a packet.
///
/// Receivers never surface these: an invalid inbound packet is dropped.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WireError {
    /// Datagram is not exactly one packet long.
    #[error("bad packet size: expected {expected} bytes, got {actual}")]
    BadSize { expected: usize, actual: usize },

    /// Invalid magic number in the packet header.
    #[error("invalid magic: expected 0xdeadbeef, got 0x{0:08x}")]
    InvalidMagic(u32),

    /// Unsupported protocol version.
    #[error("unsupported protocol version: {0}")]
    UnsupportedVersion(u16),

    /// Type tag outside the message-type enumeration.
    #[error("unknown message type: {0}")]
    UnknownType(u8),

    /// The packet was sent by the receiving process itself.
    #[error("packet sent by own identity {0}")]
    SelfSent(Identity),

    /// Body fields are out of range for the message type.
    #[error("invalid {message} body: {reason}")]
    InvalidBody {
        message: &'static str,
        reason: String,
    },

    /// A message does not fit into the fixed body.
    #[error("{message} exceeds the packet body: {reason}")]
    Oversized {
        message: &'static str,
        reason: String,
    },
}

impl WireError {
    pub(crate) fn invalid_body(message: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidBody {
            message,
            reason: reason.into(),
        }
    }

    pub(crate) fn oversized(message: &'static str, reason: impl Into<String>) -> Self {
        Self::Oversized {
            message,
            reason: reason.into(),
        }
    }
}
