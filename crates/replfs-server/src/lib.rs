//! # replfs-server: The replica side of `replfs`
//!
//! A replica joins the group, stages the blocks a coordinator multicasts,
//! votes on prepare-to-commit requests and applies committed blocks to a
//! file under its mount directory.
//!
//! The crate is split the usual way:
//! - [`Replica`]: the state machine. It consumes one decoded packet at a
//!   time and returns the reply to send, touching the disk only on commit.
//! - [`ReplicaServer`]: the event loop that feeds the state machine from an
//!   [`Endpoint`](replfs_net::Endpoint) and sends its replies.
//! - [`MountDir`]: the directory a replica owns exclusively.

mod error;
mod mount;
mod replica;
mod server;

pub use error::{ServerError, ServerResult};
pub use mount::MountDir;
pub use replica::{Replica, ReplicaOutput, Reply};
pub use server::{DEFAULT_POLL_INTERVAL, ReplicaServer};

#[cfg(test)]
mod tests;
