//! Packet header and whole-packet encoding.
//!
//! Every datagram carries exactly one fixed-size packet: a 19-byte header
//! followed by a [`BODY_SIZE`]-byte body. All integers are big-endian.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use replfs_types::{Identity, SequenceNumber};

use crate::error::{WireError, WireResult};
use crate::message::{BODY_SIZE, Message, MessageType};

/// Protocol magic number.
pub const MAGIC: u32 = 0xDEAD_BEEF;

/// Current protocol version.
pub const PROTOCOL_VERSION: u16 = 0x0001;

/// Header size in bytes (magic + version + type + source + destination + sequence).
pub const HEADER_SIZE: usize = 19;

/// Total size of every packet on the wire.
pub const PACKET_SIZE: usize = HEADER_SIZE + BODY_SIZE;

/// Routing metadata of a packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketHeader {
    pub source: Identity,
    /// [`Identity::BROADCAST`] addresses every replica.
    pub destination: Identity,
    pub sequence: SequenceNumber,
}

impl PacketHeader {
    /// Returns true if a process with identity `me` should look at this packet.
    pub fn is_for(&self, me: Identity) -> bool {
        self.destination == me || self.destination.is_broadcast()
    }
}

/// A decoded packet: header plus typed message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub header: PacketHeader,
    pub message: Message,
}

impl Packet {
    pub fn new(
        source: Identity,
        destination: Identity,
        sequence: SequenceNumber,
        message: Message,
    ) -> Self {
        Self {
            header: PacketHeader {
                source,
                destination,
                sequence,
            },
            message,
        }
    }

    /// Encodes the packet into exactly [`PACKET_SIZE`] bytes.
    pub fn encode(&self) -> WireResult<Bytes> {
        let mut buf = BytesMut::with_capacity(PACKET_SIZE);
        buf.put_u32(MAGIC);
        buf.put_u16(PROTOCOL_VERSION);
        buf.put_u8(self.message.message_type() as u8);
        buf.put_u32(self.header.source.as_u32());
        buf.put_u32(self.header.destination.as_u32());
        buf.put_u32(self.header.sequence.as_u32());
        self.message.encode_body(&mut buf)?;
        debug_assert_eq!(buf.len(), PACKET_SIZE);
        Ok(buf.freeze())
    }

    /// Decodes a datagram received by the process with identity `receiver`.
    ///
    /// This is the validity predicate applied to every inbound packet: the
    /// size, magic, version and type must be right, the body must decode, and
    /// the packet must not have been sent by `receiver` itself.
    pub fn decode_for(datagram: &[u8], receiver: Identity) -> WireResult<Self> {
        if datagram.len() != PACKET_SIZE {
            return Err(WireError::BadSize {
                expected: PACKET_SIZE,
                actual: datagram.len(),
            });
        }

        let mut buf = datagram;
        let magic = buf.get_u32();
        if magic != MAGIC {
            return Err(WireError::InvalidMagic(magic));
        }
        let version = buf.get_u16();
        if version != PROTOCOL_VERSION {
            return Err(WireError::UnsupportedVersion(version));
        }
        let kind = MessageType::try_from(buf.get_u8())?;
        let source = Identity::new(buf.get_u32());
        if source == receiver {
            return Err(WireError::SelfSent(source));
        }
        let destination = Identity::new(buf.get_u32());
        let sequence = SequenceNumber::new(buf.get_u32());

        let message = Message::decode_body(kind, buf)?;
        Ok(Self::new(source, destination, sequence, message))
    }
}
