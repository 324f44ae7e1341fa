//! The channel abstraction.

use std::net::SocketAddr;
use std::time::Duration;

use bytes::Bytes;

use crate::NetResult;

/// Outcome of one [`Channel::receive`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Received {
    Datagram { bytes: Bytes, source: SocketAddr },
    TimedOut,
}

/// A group datagram transport.
///
/// Every datagram sent reaches every member of the group (possibly including
/// the sender), at most once each, in no particular order, or not at all.
pub trait Channel {
    /// Sends one datagram to every member of the group.
    fn send_to_group(&mut self, datagram: &[u8]) -> NetResult<()>;

    /// Waits up to `timeout` for the next datagram.
    fn receive(&mut self, timeout: Duration) -> NetResult<Received>;
}

impl<C: Channel + ?Sized> Channel for Box<C> {
    fn send_to_group(&mut self, datagram: &[u8]) -> NetResult<()> {
        (**self).send_to_group(datagram)
    }

    fn receive(&mut self, timeout: Duration) -> NetResult<Received> {
        (**self).receive(timeout)
    }
}
