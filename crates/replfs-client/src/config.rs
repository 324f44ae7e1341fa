//! Coordinator settings.

use replfs_net::MulticastConfig;

use crate::engine::RetryPolicy;

/// Everything a coordinator needs to reach its replicas.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub multicast: MulticastConfig,
    /// Share of outbound packets to drop, 0..=100.
    pub loss_percent: u8,
    /// Exact number of replicas that must join.
    pub replicas: usize,
    pub retry: RetryPolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            multicast: MulticastConfig::default(),
            loss_percent: 0,
            replicas: 1,
            retry: RetryPolicy::default(),
        }
    }
}
