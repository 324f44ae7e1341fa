//! UDP multicast channel.

use std::io::ErrorKind;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::time::{Duration, Instant};

use bytes::Bytes;
use mio::net::UdpSocket;
use mio::{Events, Interest, Poll, Token};
use replfs_types::DEFAULT_PORT;
use socket2::{Domain, Protocol, Socket, Type};
use tracing::{debug, warn};

use crate::NetResult;
use crate::channel::{Channel, Received};

/// Multicast group shared by the coordinator and every replica.
pub const DEFAULT_GROUP: Ipv4Addr = Ipv4Addr::new(224, 1, 1, 1);

/// Datagrams never leave the local network segment.
pub const DEFAULT_TTL: u32 = 1;

const SOCKET: Token = Token(0);

/// Large enough to notice (and reject) datagrams longer than one packet.
const RECV_BUFFER_SIZE: usize = 2048;

/// Socket settings for a [`MulticastChannel`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MulticastConfig {
    pub group: Ipv4Addr,
    pub port: u16,
    pub ttl: u32,
    /// Deliver our own datagrams back to us (filtered later by identity).
    pub loopback: bool,
}

impl Default for MulticastConfig {
    fn default() -> Self {
        Self {
            group: DEFAULT_GROUP,
            port: DEFAULT_PORT,
            ttl: DEFAULT_TTL,
            loopback: true,
        }
    }
}

/// A UDP socket joined to the replication group.
pub struct MulticastChannel {
    socket: UdpSocket,
    poll: Poll,
    events: Events,
    group: SocketAddr,
    buf: Box<[u8]>,
}

impl std::fmt::Debug for MulticastChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MulticastChannel")
            .field("group", &self.group)
            .finish_non_exhaustive()
    }
}

impl MulticastChannel {
    /// Binds `0.0.0.0:port` with address reuse and joins the group.
    ///
    /// Several processes on one host may bind the same port.
    pub fn bind(config: MulticastConfig) -> NetResult<Self> {
        let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
        socket.set_reuse_address(true)?;
        socket.bind(&SocketAddr::from((Ipv4Addr::UNSPECIFIED, config.port)).into())?;
        socket.set_multicast_ttl_v4(config.ttl)?;
        socket.set_multicast_loop_v4(config.loopback)?;
        socket.join_multicast_v4(&config.group, &Ipv4Addr::UNSPECIFIED)?;
        socket.set_nonblocking(true)?;

        let mut socket = UdpSocket::from_std(socket.into());
        let poll = Poll::new()?;
        poll.registry()
            .register(&mut socket, SOCKET, Interest::READABLE)?;

        let group = SocketAddr::V4(SocketAddrV4::new(config.group, config.port));
        debug!(%group, ttl = config.ttl, "joined multicast group");

        Ok(Self {
            socket,
            poll,
            events: Events::with_capacity(8),
            group,
            buf: vec![0; RECV_BUFFER_SIZE].into_boxed_slice(),
        })
    }

    pub fn group(&self) -> SocketAddr {
        self.group
    }
}

impl Channel for MulticastChannel {
    fn send_to_group(&mut self, datagram: &[u8]) -> NetResult<()> {
        match self.socket.send_to(datagram, self.group) {
            Ok(_) => Ok(()),
            // A full send buffer is indistinguishable from loss.
            Err(e) if e.kind() == ErrorKind::WouldBlock => {
                warn!(group = %self.group, "send buffer full, datagram dropped");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    fn receive(&mut self, timeout: Duration) -> NetResult<Received> {
        let deadline = Instant::now() + timeout;

        loop {
            // Readiness is edge-triggered: drain before waiting again.
            match self.socket.recv_from(&mut self.buf) {
                Ok((len, source)) => {
                    return Ok(Received::Datagram {
                        bytes: Bytes::copy_from_slice(&self.buf[..len]),
                        source,
                    });
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => {}
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }

            let now = Instant::now();
            if now >= deadline {
                return Ok(Received::TimedOut);
            }
            if let Err(e) = self.poll.poll(&mut self.events, Some(deadline - now)) {
                if e.kind() != ErrorKind::Interrupted {
                    return Err(e.into());
                }
            }
        }
    }
}
