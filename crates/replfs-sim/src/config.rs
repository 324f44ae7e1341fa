//! Simulation parameters.

use std::time::Duration;

use replfs_client::RetryPolicy;
use replfs_types::{Identity, MAX_ATTEMPTS};

/// Shape of a simulated cluster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimConfig {
    pub replicas: usize,
    /// Seeds packet loss and every identity generator.
    pub seed: u64,
    /// Share of datagrams lost in each direction, per receiver.
    pub loss_percent: u8,
    /// Fixed replica identities; drawn from the seed when `None`.
    pub identities: Option<Vec<Identity>>,
    pub retry: RetryPolicy,
}

impl SimConfig {
    pub fn new(replicas: usize) -> Self {
        Self {
            replicas,
            seed: 0,
            loss_percent: 0,
            identities: None,
            retry: RetryPolicy {
                max_attempts: MAX_ATTEMPTS,
                // Delivery is synchronous, windows end as soon as the
                // reply queue drains.
                attempt_window: Duration::from_millis(50),
            },
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_loss(mut self, percent: u8) -> Self {
        self.loss_percent = percent;
        self
    }

    pub fn with_identities(mut self, identities: impl IntoIterator<Item = u32>) -> Self {
        self.identities = Some(identities.into_iter().map(Identity::new).collect());
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}
