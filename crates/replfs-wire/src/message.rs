//! Protocol messages and their body layouts.
//!
//! ## Membership
//! - [`Message::JoinRequest`] - Coordinator → All: who is out there?
//! - [`Message::JoinResponse`] - Replica → Coordinator: I am
//!
//! ## File session
//! - [`Message::OpenFileRequest`] / [`Message::OpenFileResponse`]
//! - [`Message::WriteBlock`] - Coordinator → All: stage this block
//! - [`Message::CloseFileRequest`] / [`Message::CloseFileResponse`]
//!
//! ## Two-phase commit
//! - [`Message::PrepareRequest`] - Coordinator → All: vote on these blocks
//! - [`Message::PrepareResponse`] - Replica → Coordinator: my vote
//! - [`Message::CommitRequest`] / [`Message::CommitResponse`]
//! - [`Message::AbortRequest`] / [`Message::AbortResponse`]

use bytes::{Buf, BufMut, Bytes, BytesMut};
use replfs_types::{
    BlockId, BlockRange, FileDescriptor, MAX_BLOCK_LENGTH, MAX_FILE_NAME_LENGTH, MAX_WRITES,
    TransactionId,
};

use crate::error::{WireError, WireResult};

/// Size of the type-specific packet body (the largest body, `WriteBlock`).
pub const BODY_SIZE: usize = 16 + MAX_BLOCK_LENGTH;

/// Bytes reserved for a NUL-terminated file name.
const FILE_NAME_FIELD: usize = MAX_FILE_NAME_LENGTH + 1;

/// Wire encoding of "no block range" (`-1` for both first and last).
const NO_BLOCK: u32 = u32::MAX;

// ============================================================================
// Message Type
// ============================================================================

/// Message-type tag carried in the packet header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageType {
    JoinRequest = 0,
    JoinResponse = 1,
    OpenFileRequest = 2,
    OpenFileResponse = 3,
    WriteBlock = 4,
    PrepareRequest = 5,
    PrepareResponse = 6,
    CommitRequest = 7,
    CommitResponse = 8,
    AbortRequest = 9,
    AbortResponse = 10,
    CloseFileRequest = 11,
    CloseFileResponse = 12,
}

impl MessageType {
    /// Returns the name used in logs and errors.
    pub fn name(self) -> &'static str {
        match self {
            Self::JoinRequest => "JoinRequest",
            Self::JoinResponse => "JoinResponse",
            Self::OpenFileRequest => "OpenFileRequest",
            Self::OpenFileResponse => "OpenFileResponse",
            Self::WriteBlock => "WriteBlock",
            Self::PrepareRequest => "PrepareToCommitRequest",
            Self::PrepareResponse => "PrepareToCommitResponse",
            Self::CommitRequest => "CommitRequest",
            Self::CommitResponse => "CommitResponse",
            Self::AbortRequest => "AbortRequest",
            Self::AbortResponse => "AbortResponse",
            Self::CloseFileRequest => "CloseFileRequest",
            Self::CloseFileResponse => "CloseFileResponse",
        }
    }

    /// Returns true for messages a coordinator sends to replicas.
    pub fn is_request(self) -> bool {
        matches!(
            self,
            Self::JoinRequest
                | Self::OpenFileRequest
                | Self::WriteBlock
                | Self::PrepareRequest
                | Self::CommitRequest
                | Self::AbortRequest
                | Self::CloseFileRequest
        )
    }
}

impl TryFrom<u8> for MessageType {
    type Error = WireError;

    fn try_from(tag: u8) -> Result<Self, Self::Error> {
        Ok(match tag {
            0 => Self::JoinRequest,
            1 => Self::JoinResponse,
            2 => Self::OpenFileRequest,
            3 => Self::OpenFileResponse,
            4 => Self::WriteBlock,
            5 => Self::PrepareRequest,
            6 => Self::PrepareResponse,
            7 => Self::CommitRequest,
            8 => Self::CommitResponse,
            9 => Self::AbortRequest,
            10 => Self::AbortResponse,
            11 => Self::CloseFileRequest,
            12 => Self::CloseFileResponse,
            other => return Err(WireError::UnknownType(other)),
        })
    }
}

// ============================================================================
// Body Types
// ============================================================================

/// What a replica should do with its identity before answering a join.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinMode {
    KeepIdentity,
    RegenerateIdentity,
}

/// A block of file data staged on replicas until commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteBlock {
    pub block_id: BlockId,
    pub descriptor: FileDescriptor,
    pub offset: u32,
    pub data: Bytes,
}

/// Phase-one request of the two-phase commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrepareRequest {
    pub transaction: TransactionId,
    pub descriptor: FileDescriptor,
    /// `None` when the transaction staged no blocks.
    pub blocks: Option<BlockRange>,
}

/// A replica's answer to a prepare-to-commit request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Vote {
    Yes,
    /// Ids named by the request that the replica has not staged, ascending.
    MissingBlocks(Vec<BlockId>),
    InvalidDescriptor,
}

impl Vote {
    pub fn is_yes(&self) -> bool {
        matches!(self, Self::Yes)
    }
}

/// Phase-one response of the two-phase commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrepareResponse {
    pub transaction: TransactionId,
    pub vote: Vote,
}

/// Outcome code of abort and close responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Success,
    Failure,
}

impl Status {
    pub fn from_success(success: bool) -> Self {
        if success { Self::Success } else { Self::Failure }
    }

    pub fn is_success(self) -> bool {
        self == Self::Success
    }
}

// ============================================================================
// Message
// ============================================================================

/// A typed protocol message (the packet body plus its type tag).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    JoinRequest { mode: JoinMode },
    JoinResponse,
    OpenFileRequest { file_name: String },
    /// `None` when the replica rejected the open.
    OpenFileResponse { descriptor: Option<FileDescriptor> },
    WriteBlock(WriteBlock),
    PrepareRequest(PrepareRequest),
    PrepareResponse(PrepareResponse),
    CommitRequest { transaction: TransactionId },
    CommitResponse { transaction: TransactionId },
    AbortRequest { descriptor: FileDescriptor },
    AbortResponse { status: Status },
    CloseFileRequest { descriptor: FileDescriptor },
    CloseFileResponse { status: Status },
}

impl Message {
    /// Returns the type tag of this message.
    pub fn message_type(&self) -> MessageType {
        match self {
            Self::JoinRequest { .. } => MessageType::JoinRequest,
            Self::JoinResponse => MessageType::JoinResponse,
            Self::OpenFileRequest { .. } => MessageType::OpenFileRequest,
            Self::OpenFileResponse { .. } => MessageType::OpenFileResponse,
            Self::WriteBlock(_) => MessageType::WriteBlock,
            Self::PrepareRequest(_) => MessageType::PrepareRequest,
            Self::PrepareResponse(_) => MessageType::PrepareResponse,
            Self::CommitRequest { .. } => MessageType::CommitRequest,
            Self::CommitResponse { .. } => MessageType::CommitResponse,
            Self::AbortRequest { .. } => MessageType::AbortRequest,
            Self::AbortResponse { .. } => MessageType::AbortResponse,
            Self::CloseFileRequest { .. } => MessageType::CloseFileRequest,
            Self::CloseFileResponse { .. } => MessageType::CloseFileResponse,
        }
    }

    /// Writes the body into `buf`, zero padded to exactly [`BODY_SIZE`].
    pub(crate) fn encode_body(&self, buf: &mut BytesMut) -> WireResult<()> {
        let start = buf.len();
        let name = self.message_type().name();

        match self {
            Self::JoinRequest { mode } => buf.put_u8(match mode {
                JoinMode::KeepIdentity => 0,
                JoinMode::RegenerateIdentity => 1,
            }),
            Self::JoinResponse => {}
            Self::OpenFileRequest { file_name } => {
                let raw = file_name.as_bytes();
                if raw.len() > MAX_FILE_NAME_LENGTH {
                    return Err(WireError::oversized(
                        name,
                        format!("file name is {} bytes (max {MAX_FILE_NAME_LENGTH})", raw.len()),
                    ));
                }
                if raw.contains(&0) {
                    return Err(WireError::invalid_body(name, "file name contains NUL"));
                }
                buf.put_slice(raw);
                buf.put_bytes(0, FILE_NAME_FIELD - raw.len());
            }
            Self::OpenFileResponse { descriptor } => {
                buf.put_u32(descriptor.map_or(FileDescriptor::INVALID_RAW, FileDescriptor::as_u32));
            }
            Self::WriteBlock(block) => {
                if block.data.len() > MAX_BLOCK_LENGTH {
                    return Err(WireError::oversized(
                        name,
                        format!("{} data bytes (max {MAX_BLOCK_LENGTH})", block.data.len()),
                    ));
                }
                buf.put_u32(block.block_id.as_u32());
                buf.put_u32(block.descriptor.as_u32());
                buf.put_u32(block.offset);
                buf.put_u32(block.data.len() as u32);
                buf.put_slice(&block.data);
            }
            Self::PrepareRequest(request) => {
                let (first, last) = request
                    .blocks
                    .map_or((NO_BLOCK, NO_BLOCK), |r| (r.first().as_u32(), r.last().as_u32()));
                buf.put_u32(request.transaction.as_u32());
                buf.put_u32(request.descriptor.as_u32());
                buf.put_u32(first);
                buf.put_u32(last);
            }
            Self::PrepareResponse(response) => {
                buf.put_u32(response.transaction.as_u32());
                match &response.vote {
                    Vote::Yes => {
                        buf.put_u8(0);
                        buf.put_u32(0);
                    }
                    Vote::MissingBlocks(ids) => {
                        if ids.len() > MAX_WRITES {
                            return Err(WireError::oversized(
                                name,
                                format!("{} missing ids (max {MAX_WRITES})", ids.len()),
                            ));
                        }
                        buf.put_u8(1);
                        buf.put_u32(ids.len() as u32);
                        for id in ids {
                            buf.put_u32(id.as_u32());
                        }
                    }
                    Vote::InvalidDescriptor => {
                        buf.put_u8(2);
                        buf.put_u32(0);
                    }
                }
            }
            Self::CommitRequest { transaction } | Self::CommitResponse { transaction } => {
                buf.put_u32(transaction.as_u32());
            }
            Self::AbortRequest { descriptor } | Self::CloseFileRequest { descriptor } => {
                buf.put_u32(descriptor.as_u32());
            }
            Self::AbortResponse { status } | Self::CloseFileResponse { status } => {
                buf.put_u8(match status {
                    Status::Success => 0,
                    Status::Failure => 1,
                });
            }
        }

        let written = buf.len() - start;
        debug_assert!(written <= BODY_SIZE, "{name} body overflow: {written}");
        buf.put_bytes(0, BODY_SIZE - written);
        Ok(())
    }

    /// Decodes a body of the given type. `body` is exactly [`BODY_SIZE`] bytes.
    pub(crate) fn decode_body(kind: MessageType, mut body: &[u8]) -> WireResult<Self> {
        debug_assert_eq!(body.len(), BODY_SIZE);
        let name = kind.name();

        let message = match kind {
            MessageType::JoinRequest => Self::JoinRequest {
                mode: match body.get_u8() {
                    0 => JoinMode::KeepIdentity,
                    1 => JoinMode::RegenerateIdentity,
                    other => {
                        return Err(WireError::invalid_body(name, format!("join mode {other}")));
                    }
                },
            },
            MessageType::JoinResponse => Self::JoinResponse,
            MessageType::OpenFileRequest => {
                let field = &body[..FILE_NAME_FIELD];
                let len = field
                    .iter()
                    .position(|&b| b == 0)
                    .ok_or_else(|| WireError::invalid_body(name, "file name not terminated"))?;
                let file_name = std::str::from_utf8(&field[..len])
                    .map_err(|e| WireError::invalid_body(name, e.to_string()))?;
                Self::OpenFileRequest {
                    file_name: file_name.to_owned(),
                }
            }
            MessageType::OpenFileResponse => {
                let raw = body.get_u32();
                Self::OpenFileResponse {
                    descriptor: (raw != FileDescriptor::INVALID_RAW)
                        .then(|| FileDescriptor::new(raw)),
                }
            }
            MessageType::WriteBlock => {
                let block_id = BlockId::new(body.get_u32());
                let descriptor = FileDescriptor::new(body.get_u32());
                let offset = body.get_u32();
                let len = body.get_u32() as usize;
                if len > MAX_BLOCK_LENGTH {
                    return Err(WireError::invalid_body(name, format!("block length {len}")));
                }
                Self::WriteBlock(WriteBlock {
                    block_id,
                    descriptor,
                    offset,
                    data: Bytes::copy_from_slice(&body[..len]),
                })
            }
            MessageType::PrepareRequest => {
                let transaction = TransactionId::new(body.get_u32());
                let descriptor = FileDescriptor::new(body.get_u32());
                let first = body.get_u32();
                let last = body.get_u32();
                let blocks = if first == NO_BLOCK && last == NO_BLOCK {
                    None
                } else {
                    Some(
                        BlockRange::new(BlockId::new(first), BlockId::new(last)).ok_or_else(
                            || WireError::invalid_body(name, format!("range {first}..={last}")),
                        )?,
                    )
                };
                Self::PrepareRequest(PrepareRequest {
                    transaction,
                    descriptor,
                    blocks,
                })
            }
            MessageType::PrepareResponse => {
                let transaction = TransactionId::new(body.get_u32());
                let code = body.get_u8();
                let count = body.get_u32() as usize;
                let vote = match code {
                    0 => Vote::Yes,
                    1 => {
                        if count > MAX_WRITES {
                            return Err(WireError::invalid_body(
                                name,
                                format!("{count} missing ids"),
                            ));
                        }
                        Vote::MissingBlocks((0..count).map(|_| BlockId::new(body.get_u32())).collect())
                    }
                    2 => Vote::InvalidDescriptor,
                    other => {
                        return Err(WireError::invalid_body(name, format!("vote code {other}")));
                    }
                };
                Self::PrepareResponse(PrepareResponse { transaction, vote })
            }
            MessageType::CommitRequest => Self::CommitRequest {
                transaction: TransactionId::new(body.get_u32()),
            },
            MessageType::CommitResponse => Self::CommitResponse {
                transaction: TransactionId::new(body.get_u32()),
            },
            MessageType::AbortRequest => Self::AbortRequest {
                descriptor: FileDescriptor::new(body.get_u32()),
            },
            MessageType::AbortResponse => Self::AbortResponse {
                status: decode_status(name, body.get_u8())?,
            },
            MessageType::CloseFileRequest => Self::CloseFileRequest {
                descriptor: FileDescriptor::new(body.get_u32()),
            },
            MessageType::CloseFileResponse => Self::CloseFileResponse {
                status: decode_status(name, body.get_u8())?,
            },
        };

        Ok(message)
    }
}

fn decode_status(name: &'static str, code: u8) -> WireResult<Status> {
    match code {
        0 => Ok(Status::Success),
        1 => Ok(Status::Failure),
        other => Err(WireError::invalid_body(name, format!("status code {other}"))),
    }
}
