//! CLI command implementations.

pub mod config;
pub mod put;
pub mod server;
pub mod version;
