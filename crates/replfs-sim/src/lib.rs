//! # replfs-sim: Deterministic in-process cluster for `replfs`
//!
//! [`SimCluster`] hosts a set of real [`Replica`](replfs_server::Replica)
//! state machines, each writing into its own temporary mount directory, and
//! implements [`Channel`](replfs_net::Channel) so a real
//! [`Coordinator`](replfs_client::Coordinator) can drive them.
//!
//! ```text
//!  Coordinator ──send_to_group──► SimCluster ──on_packet──► Replica 0..n
//!       ▲                            │   faults: loss, isolation,
//!       └──────────receive───────────┘   held write blocks, injection
//! ```
//!
//! Delivery is synchronous: every datagram the coordinator sends is handed
//! to each replica immediately and the replies are queued for the
//! coordinator. An empty queue times out at once, so an attempt window never
//! actually sleeps. All randomness comes from one seed.
//!
//! ## Quick Start
//!
//! ```ignore
//! use replfs_sim::{SimCluster, SimConfig};
//!
//! let cluster = SimCluster::new(SimConfig::new(3).with_seed(7))?;
//! let mut coordinator = cluster.connect()?;
//! let fd = coordinator.open("file.txt")?;
//! coordinator.write(fd, b"hello", 0)?;
//! coordinator.commit(fd)?;
//! coordinator.close(fd)?;
//! assert_eq!(coordinator.channel().file(0, "file.txt").as_deref(), Some(&b"hello"[..]));
//! ```

mod cluster;
mod config;
mod error;

pub use cluster::{SimCluster, SimStats};
pub use config::SimConfig;
pub use error::{SimError, SimResult};

#[cfg(test)]
mod tests;
