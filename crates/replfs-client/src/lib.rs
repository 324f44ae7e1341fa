//! # replfs-client: The coordinator side of `replfs`
//!
//! A [`Coordinator`] writes one file at a time to a fixed-size group of
//! replicas over a lossy multicast channel:
//!
//! ```text
//! connect ─► open ─► write* ─► commit ─┐
//!                      ▲               │
//!                      └──── abort ◄───┤
//!                                      ▼
//!                                    close
//! ```
//!
//! Every exchange with the replicas runs through [`engine::drive`], which
//! retransmits a request until a completion predicate holds or the retry
//! ceiling is reached.

mod config;
mod coordinator;
pub mod engine;
mod error;
mod membership;
mod replica_set;

pub use config::ClientConfig;
pub use coordinator::Coordinator;
pub use engine::{NextAttempt, RetryPolicy};
pub use error::{ClientError, ClientResult};
pub use replica_set::{ReplicaHandle, ReplicaSet};
