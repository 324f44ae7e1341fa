//! Packet-level endpoint over a [`Channel`].

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use replfs_types::{Identity, SequenceNumber};
use replfs_wire::{Message, Packet};
use tracing::trace;

use crate::NetResult;
use crate::channel::{Channel, Received};

/// A valid packet together with the address it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inbound {
    pub packet: Packet,
    pub source: SocketAddr,
}

/// One process's view of the group: its channel, identity and outbound
/// sequence counter.
#[derive(Debug)]
pub struct Endpoint<C> {
    channel: C,
    identity: Identity,
    sequence: SequenceNumber,
}

impl<C: Channel> Endpoint<C> {
    pub fn new(channel: C, identity: Identity) -> Self {
        Self {
            channel,
            identity,
            sequence: SequenceNumber::default(),
        }
    }

    pub fn identity(&self) -> Identity {
        self.identity
    }

    /// Replaces the identity stamped on outbound packets and used to
    /// discard our own loopback traffic.
    pub fn set_identity(&mut self, identity: Identity) {
        self.identity = identity;
    }

    pub fn channel(&self) -> &C {
        &self.channel
    }

    pub fn channel_mut(&mut self) -> &mut C {
        &mut self.channel
    }

    /// Sends `message` addressed to `to` (delivered to the whole group).
    pub fn send(&mut self, to: Identity, message: Message) -> NetResult<()> {
        let sequence = self.sequence.advance();
        let kind = message.message_type();
        let packet = Packet::new(self.identity, to, sequence, message);
        let bytes = packet.encode()?;
        trace!(
            message = kind.name(),
            to = %to,
            seq = sequence.as_u32(),
            "sending packet"
        );
        self.channel.send_to_group(&bytes)
    }

    /// Sends `message` addressed to every replica.
    pub fn broadcast(&mut self, message: Message) -> NetResult<()> {
        self.send(Identity::BROADCAST, message)
    }

    /// Waits up to `timeout` for the next valid packet.
    ///
    /// Invalid datagrams (wrong size, magic, version or type, undecodable
    /// body, or sent by this endpoint) are dropped and the wait continues.
    pub fn receive(&mut self, timeout: Duration) -> NetResult<Option<Inbound>> {
        let deadline = Instant::now() + timeout;

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.channel.receive(remaining)? {
                Received::TimedOut => return Ok(None),
                Received::Datagram { bytes, source } => {
                    match Packet::decode_for(&bytes, self.identity) {
                        Ok(packet) => return Ok(Some(Inbound { packet, source })),
                        Err(error) => {
                            trace!(%source, %error, "dropping invalid packet");
                        }
                    }
                }
            }
            if Instant::now() >= deadline {
                return Ok(None);
            }
        }
    }
}
