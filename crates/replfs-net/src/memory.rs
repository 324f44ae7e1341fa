//! In-process multicast group.

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;

use crate::NetResult;
use crate::channel::{Channel, Received};

/// First port handed out to in-memory endpoints.
const BASE_PORT: u16 = 50_000;

type Mailbox = Sender<(Bytes, SocketAddr)>;

/// A multicast group living in process memory.
///
/// Every datagram goes to every endpoint, the sender included, mirroring
/// multicast loopback. Delivery is reliable and FIFO per sender; wrap the
/// endpoints in [`crate::Lossy`] to lose packets.
#[derive(Debug, Clone, Default)]
pub struct MemoryNetwork {
    members: Arc<Mutex<Vec<Mailbox>>>,
}

impl MemoryNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an endpoint to the group. Each endpoint gets a distinct
    /// loopback address.
    pub fn join(&self) -> NetResult<MemoryChannel> {
        let (tx, rx) = mpsc::channel();
        let mut members = self.lock()?;
        let port = BASE_PORT + members.len() as u16;
        members.push(tx);
        Ok(MemoryChannel {
            network: self.clone(),
            address: SocketAddr::from((Ipv4Addr::LOCALHOST, port)),
            inbox: rx,
        })
    }

    fn lock(&self) -> NetResult<std::sync::MutexGuard<'_, Vec<Mailbox>>> {
        self.members
            .lock()
            .map_err(|_| std::io::Error::other("memory network lock poisoned").into())
    }
}

/// One member of a [`MemoryNetwork`].
#[derive(Debug)]
pub struct MemoryChannel {
    network: MemoryNetwork,
    address: SocketAddr,
    inbox: Receiver<(Bytes, SocketAddr)>,
}

impl MemoryChannel {
    pub fn address(&self) -> SocketAddr {
        self.address
    }
}

impl Channel for MemoryChannel {
    fn send_to_group(&mut self, datagram: &[u8]) -> NetResult<()> {
        let bytes = Bytes::copy_from_slice(datagram);
        let members = self.network.lock()?;
        for member in members.iter() {
            // A dropped endpoint simply stops receiving.
            let _ = member.send((bytes.clone(), self.address));
        }
        Ok(())
    }

    fn receive(&mut self, timeout: Duration) -> NetResult<Received> {
        match self.inbox.recv_timeout(timeout) {
            Ok((bytes, source)) => Ok(Received::Datagram { bytes, source }),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => {
                Ok(Received::TimedOut)
            }
        }
    }
}
