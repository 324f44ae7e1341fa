//! # replfs-wire: Binary wire protocol for `replfs`
//!
//! Every datagram exchanged between the coordinator and the replicas is one
//! fixed-size packet.
//!
//! ## Packet Format
//!
//! ```text
//! ┌─────────┬─────────┬──────┬──────────┬─────────────┬──────────┬────────────────┐
//! │ Magic   │ Version │ Type │ Source   │ Destination │ Sequence │     Body       │
//! │ (4 B)   │ (2 B)   │ (1 B)│ (4 B)    │ (4 B)       │ (4 B)    │    (528 B)     │
//! └─────────┴─────────┴──────┴──────────┴─────────────┴──────────┴────────────────┘
//! ```
//!
//! - **Magic**: `0xDEADBEEF`
//! - **Version**: Protocol version (currently 1)
//! - **Type**: [`MessageType`] tag
//! - **Destination**: `0` addresses every replica
//! - **Body**: type-specific layout, zero padded
//!
//! Integers are big-endian. Anything that fails [`Packet::decode_for`] is
//! dropped by the receiver without a reply.

mod error;
mod message;
mod packet;

pub use error::{WireError, WireResult};
pub use message::{
    BODY_SIZE, JoinMode, Message, MessageType, PrepareRequest, PrepareResponse, Status, Vote,
    WriteBlock,
};
pub use packet::{HEADER_SIZE, MAGIC, PACKET_SIZE, PROTOCOL_VERSION, Packet, PacketHeader};
