//! Wiring a loaded configuration into running components.

use std::time::Duration;

use replfs_client::{ClientConfig, RetryPolicy};
use replfs_config::{NetworkConfig, ReplfsConfig};
use replfs_io::SyncBackend;
use replfs_net::{Lossy, MulticastChannel, MulticastConfig, PacketLoss};
use replfs_server::{MountDir, Replica, ReplicaServer, ServerResult};
use replfs_types::IdentityGenerator;
use tracing::info;

/// A replica serving the real multicast group.
pub type GroupServer = ReplicaServer<Lossy<MulticastChannel>, SyncBackend>;

pub fn multicast_config(network: &NetworkConfig) -> MulticastConfig {
    MulticastConfig {
        group: network.group,
        port: network.port,
        ttl: network.ttl,
        ..MulticastConfig::default()
    }
}

pub fn client_config(config: &ReplfsConfig) -> ClientConfig {
    ClientConfig {
        multicast: multicast_config(&config.network),
        loss_percent: config.network.loss_percent,
        replicas: config.client.replicas,
        retry: RetryPolicy {
            max_attempts: config.client.max_attempts,
            attempt_window: Duration::from_millis(config.client.attempt_window_ms),
        },
    }
}

/// Claims the mount directory, joins the group and returns a replica ready
/// to [`run`](ReplicaServer::run).
///
/// The mount directory is created before the socket is bound, so a second
/// replica pointed at the same directory fails without touching the group.
pub fn bind_server(config: &ReplfsConfig) -> ServerResult<GroupServer> {
    let mount = MountDir::create(config.server.mount.clone())?;
    let channel = MulticastChannel::bind(multicast_config(&config.network))?;
    let channel = Lossy::new(
        channel,
        PacketLoss::from_entropy(config.network.loss_percent),
    );

    let replica = Replica::new(mount, SyncBackend::new(), IdentityGenerator::from_entropy());
    info!(
        replica = %replica.identity(),
        port = config.network.port,
        loss = config.network.loss_percent,
        "replica bound"
    );
    Ok(ReplicaServer::new(channel, replica)
        .with_poll_interval(Duration::from_millis(config.server.poll_interval_ms)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use replfs_server::ServerError;
    use std::net::Ipv4Addr;

    #[test]
    fn client_config_follows_the_file() {
        let mut config = ReplfsConfig::default();
        config.network.port = 45123;
        config.network.loss_percent = 30;
        config.client.replicas = 4;
        config.client.max_attempts = 3;
        config.client.attempt_window_ms = 250;

        let client = client_config(&config);
        assert_eq!(client.multicast.port, 45123);
        assert_eq!(client.multicast.group, Ipv4Addr::new(224, 1, 1, 1));
        assert!(client.multicast.loopback);
        assert_eq!(client.loss_percent, 30);
        assert_eq!(client.replicas, 4);
        assert_eq!(client.retry.max_attempts, 3);
        assert_eq!(client.retry.attempt_window, Duration::from_millis(250));
    }

    #[test]
    fn defaults_agree_with_the_transport() {
        let config = ReplfsConfig::default();
        assert_eq!(multicast_config(&config.network), MulticastConfig::default());
        assert_eq!(client_config(&config), ClientConfig::default());
    }

    #[test]
    fn existing_mount_is_refused_before_binding() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = ReplfsConfig::default();
        config.server.mount = dir.path().to_path_buf();

        assert!(matches!(
            bind_server(&config),
            Err(ServerError::MountInUse { .. })
        ));
    }
}
