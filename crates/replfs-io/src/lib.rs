//! # replfs-io: File backend for replfs replicas
//!
//! Replicas apply committed blocks with positioned writes into files under
//! their mount directory. This crate hides the OS calls behind the
//! [`IoBackend`] trait so the replica state machine can be driven against
//! a real directory in tests and in the binary alike.
//!
//! ```text
//! ┌──────────────────────────┐
//! │      replfs-server       │
//! │  (commit → write_at)     │
//! └────────────┬─────────────┘
//!              │
//! ┌────────────┴─────────────┐
//! │        replfs-io         │
//! │      SyncBackend         │
//! └──────────────────────────┘
//! ```

mod backend;
mod error;
mod sync_backend;

pub use backend::{FileHandle, IoBackend, OpenFlags};
pub use error::{IoError, IoResult};
pub use sync_backend::SyncBackend;
