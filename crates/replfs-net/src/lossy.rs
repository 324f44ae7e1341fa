//! Outbound packet loss.

use std::time::Duration;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use tracing::trace;

use crate::NetResult;
use crate::channel::{Channel, Received};

/// Seeded decision source for dropping packets.
#[derive(Debug, Clone)]
pub struct PacketLoss {
    percent: u8,
    rng: SmallRng,
}

impl PacketLoss {
    /// `percent` is clamped to 100.
    pub fn new(percent: u8, seed: u64) -> Self {
        Self {
            percent: percent.min(100),
            rng: SmallRng::seed_from_u64(seed),
        }
    }

    pub fn from_entropy(percent: u8) -> Self {
        Self {
            percent: percent.min(100),
            rng: SmallRng::from_entropy(),
        }
    }

    /// Never drops.
    pub fn none() -> Self {
        Self::new(0, 0)
    }

    pub fn percent(&self) -> u8 {
        self.percent
    }

    /// Returns true if the next packet should be lost.
    pub fn should_drop(&mut self) -> bool {
        self.percent > 0 && self.rng.gen_range(0..100u8) < self.percent
    }
}

/// A channel that loses a share of the datagrams it sends.
#[derive(Debug)]
pub struct Lossy<C> {
    inner: C,
    loss: PacketLoss,
    dropped: u64,
}

impl<C: Channel> Lossy<C> {
    pub fn new(inner: C, loss: PacketLoss) -> Self {
        Self {
            inner,
            loss,
            dropped: 0,
        }
    }

    /// Datagrams dropped so far.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }

    pub fn into_inner(self) -> C {
        self.inner
    }
}

impl<C: Channel> Channel for Lossy<C> {
    fn send_to_group(&mut self, datagram: &[u8]) -> NetResult<()> {
        if self.loss.should_drop() {
            self.dropped += 1;
            trace!(dropped = self.dropped, "outbound datagram lost");
            return Ok(());
        }
        self.inner.send_to_group(datagram)
    }

    fn receive(&mut self, timeout: Duration) -> NetResult<Received> {
        self.inner.receive(timeout)
    }
}
