//! Server command - runs one replica until a fatal error.

use anyhow::{Context, Result};
use replfs::ReplfsConfig;
use tracing::info;

pub fn run(config: &ReplfsConfig) -> Result<()> {
    let mut server = replfs::bind_server(config).with_context(|| {
        format!(
            "Failed to start replica on {}",
            config.server.mount.display()
        )
    })?;

    info!(
        mount = %config.server.mount.display(),
        group = %config.network.group,
        port = config.network.port,
        "replica running"
    );
    server.run().context("Replica stopped")?;
    Ok(())
}
