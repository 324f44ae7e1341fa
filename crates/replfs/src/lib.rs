//! # replfs
//!
//! Replicated file writes over lossy UDP multicast.
//!
//! One coordinator writes a file to a fixed-size group of replicas. Writes
//! are staged on every replica and applied atomically by a two-phase
//! commit that needs a unanimous yes vote; packets may be lost, duplicated
//! or reordered at any point.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                            replfs                            │
//! │  ┌─────────────┐  multicast  ┌─────────────┐  ┌───────────┐  │
//! │  │ Coordinator │ ◄─────────► │  Replica ×n │ →│ MountDir  │  │
//! │  │  (client)   │   (wire)    │  (server)   │  │  (io)     │  │
//! │  └─────────────┘             └─────────────┘  └───────────┘  │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ```ignore
//! use replfs::{Coordinator, ReplfsConfig};
//!
//! let config = ReplfsConfig::load()?;
//! let mut coordinator = Coordinator::connect(&replfs::client_config(&config))?;
//! let fd = coordinator.open("notes.txt")?;
//! coordinator.write(fd, b"hello", 0)?;
//! coordinator.commit(fd)?;
//! coordinator.close(fd)?;
//! ```

mod setup;

pub use setup::{GroupServer, bind_server, client_config, multicast_config};

// Client
pub use replfs_client::{
    ClientConfig, ClientError, ClientResult, Coordinator, ReplicaHandle, ReplicaSet, RetryPolicy,
};

// Server
pub use replfs_server::{MountDir, Replica, ReplicaServer, ServerError, ServerResult};

// Configuration
pub use replfs_config::{ConfigError, ConfigLoader, ReplfsConfig};

// Transport
pub use replfs_net::{Lossy, MulticastChannel, MulticastConfig, PacketLoss};

// Core types
pub use replfs_types::{
    BlockId, FileDescriptor, Identity, IdentityGenerator, MAX_BLOCK_LENGTH, MAX_FILE_LENGTH,
    MAX_FILE_NAME_LENGTH, MAX_WRITES, TransactionId,
};

pub use replfs_io::SyncBackend;
pub use replfs_wire::{Message, Packet};
