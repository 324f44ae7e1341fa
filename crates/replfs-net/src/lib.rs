//! # replfs-net: Unreliable datagram channels for `replfs`
//!
//! The protocol runs over a transport that may lose, duplicate or reorder
//! any datagram. This crate provides that transport and nothing more:
//!
//! - [`Channel`]: send to the group, receive with a timeout
//! - [`MulticastChannel`]: UDP multicast on `224.1.1.1`
//! - [`MemoryNetwork`]: in-process group for threaded tests
//! - [`Lossy`]: drops a configured share of outbound datagrams
//! - [`Endpoint`]: stamps packets with the local identity and sequence
//!   number and filters out everything that fails validation
//!
//! Reliability (retries, quorum predicates) lives in `replfs-client`.

mod channel;
mod endpoint;
mod error;
mod lossy;
mod memory;
mod multicast;

pub use channel::{Channel, Received};
pub use endpoint::{Endpoint, Inbound};
pub use error::{NetError, NetResult};
pub use lossy::{Lossy, PacketLoss};
pub use memory::{MemoryChannel, MemoryNetwork};
pub use multicast::{DEFAULT_GROUP, DEFAULT_TTL, MulticastChannel, MulticastConfig};

#[cfg(test)]
mod tests;
