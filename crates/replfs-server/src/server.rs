//! Replica event loop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use replfs_io::IoBackend;
use replfs_net::{Channel, Endpoint};
use tracing::{debug, info};

use crate::error::ServerResult;
use crate::replica::Replica;

/// How long one [`ReplicaServer::step`] waits for a packet.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Drives a [`Replica`] from a channel.
#[derive(Debug)]
pub struct ReplicaServer<C, B> {
    endpoint: Endpoint<C>,
    replica: Replica<B>,
    poll_interval: Duration,
}

impl<C: Channel, B: IoBackend> ReplicaServer<C, B> {
    pub fn new(channel: C, replica: Replica<B>) -> Self {
        Self {
            endpoint: Endpoint::new(channel, replica.identity()),
            replica,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn replica(&self) -> &Replica<B> {
        &self.replica
    }

    pub fn endpoint(&self) -> &Endpoint<C> {
        &self.endpoint
    }

    /// Receives and handles at most one packet. Returns whether a packet
    /// arrived within the poll interval.
    pub fn step(&mut self) -> ServerResult<bool> {
        let Some(inbound) = self.endpoint.receive(self.poll_interval)? else {
            return Ok(false);
        };

        let output = self.replica.on_packet(&inbound.packet)?;

        // A regenerating join changes who we are before we answer.
        if self.endpoint.identity() != self.replica.identity() {
            self.endpoint.set_identity(self.replica.identity());
        }

        if let Some(reply) = output.reply {
            debug!(to = %reply.to, message = reply.message.message_type().name(), "replying");
            self.endpoint.send(reply.to, reply.message)?;
        }
        Ok(true)
    }

    /// Serves until `stop` is set or a fatal error occurs.
    pub fn run_until(&mut self, stop: &AtomicBool) -> ServerResult<()> {
        info!(replica = %self.replica.identity(), "serving");
        while !stop.load(Ordering::Relaxed) {
            self.step()?;
        }
        info!(replica = %self.replica.identity(), "stopped");
        Ok(())
    }

    /// Serves until a fatal error occurs.
    pub fn run(&mut self) -> ServerResult<()> {
        self.run_until(&AtomicBool::new(false))
    }
}
