//! Configuration display.

use anyhow::Result;
use replfs::ReplfsConfig;

/// Print the configuration after every layer and flag has been applied.
pub fn show(config: &ReplfsConfig) -> Result<()> {
    print!("{}", config.to_toml_string()?);
    Ok(())
}
