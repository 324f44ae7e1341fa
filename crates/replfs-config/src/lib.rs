//! Configuration management for replfs
//!
//! Provides hierarchical configuration loading from multiple sources:
//! 1. CLI arguments (highest precedence)
//! 2. Environment variables (REPLFS_* prefix, `__` between section and key)
//! 3. replfs.local.toml (gitignored, local overrides)
//! 4. replfs.toml (project config)
//! 5. ~/.config/replfs/config.toml (user defaults)
//! 6. Built-in defaults (lowest precedence)

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};

mod error;
mod loader;
mod paths;

pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use paths::Paths;

/// Main replfs configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplfsConfig {
    pub network: NetworkConfig,
    pub server: ServerConfig,
    pub client: ClientSection,
}

/// Multicast group settings shared by replicas and coordinators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub port: u16,
    pub group: Ipv4Addr,
    pub ttl: u32,
    /// Share of outbound packets dropped on purpose, 0..=100.
    pub loss_percent: u8,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            port: 44022,
            group: Ipv4Addr::new(224, 1, 1, 1),
            ttl: 1,
            loss_percent: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Directory that receives replicated files. Must not exist yet.
    pub mount: PathBuf,
    pub poll_interval_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            mount: PathBuf::from("replfs-mount"),
            poll_interval_ms: 100,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientSection {
    /// Exact number of replicas a coordinator waits for.
    pub replicas: usize,
    pub max_attempts: u32,
    pub attempt_window_ms: u64,
}

impl Default for ClientSection {
    fn default() -> Self {
        Self {
            replicas: 1,
            max_attempts: 10,
            attempt_window_ms: 1000,
        }
    }
}

impl ReplfsConfig {
    /// Load configuration from default locations
    pub fn load() -> Result<Self> {
        ConfigLoader::new().load()
    }

    /// Load configuration from specific project directory
    pub fn load_from_dir(project_dir: impl AsRef<Path>) -> Result<Self> {
        ConfigLoader::new().with_project_dir(project_dir).load()
    }

    /// Read a single TOML file, without any layering.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadError {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&text).map_err(|source| ConfigError::ParseError {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Render the configuration as TOML.
    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Reject values the protocol cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.network.loss_percent > 100 {
            return Err(ConfigError::ValidationError(format!(
                "network.loss_percent must be at most 100, got {}",
                self.network.loss_percent
            )));
        }
        if !self.network.group.is_multicast() {
            return Err(ConfigError::ValidationError(format!(
                "network.group {} is not a multicast address",
                self.network.group
            )));
        }
        if self.client.replicas == 0 {
            return Err(ConfigError::ValidationError(
                "client.replicas must be at least 1".to_string(),
            ));
        }
        if self.client.max_attempts == 0 {
            return Err(ConfigError::ValidationError(
                "client.max_attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Resolve relative paths to absolute
    pub fn resolve_paths(&mut self, base_dir: impl AsRef<Path>) {
        let base = base_dir.as_ref();

        if self.server.mount.is_relative() {
            self.server.mount = base.join(&self.server.mount);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = ReplfsConfig::default();
        assert_eq!(config.network.port, 44022);
        assert_eq!(config.network.group, Ipv4Addr::new(224, 1, 1, 1));
        assert_eq!(config.network.ttl, 1);
        assert_eq!(config.network.loss_percent, 0);
        assert_eq!(config.client.replicas, 1);
        assert_eq!(config.client.max_attempts, 10);
        assert_eq!(config.client.attempt_window_ms, 1000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_path_resolution() {
        let mut config = ReplfsConfig::default();
        config.resolve_paths("/srv/replfs");
        assert_eq!(config.server.mount, PathBuf::from("/srv/replfs/replfs-mount"));

        config.server.mount = PathBuf::from("/abs/mount");
        config.resolve_paths("/srv/replfs");
        assert_eq!(config.server.mount, PathBuf::from("/abs/mount"));
    }

    #[test]
    fn test_validation() {
        let mut config = ReplfsConfig::default();
        config.network.loss_percent = 101;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError(_))
        ));

        let mut config = ReplfsConfig::default();
        config.network.group = Ipv4Addr::new(10, 0, 0, 1);
        assert!(config.validate().is_err());

        let mut config = ReplfsConfig::default();
        config.client.replicas = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_toml_file() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        let path = temp_dir.path().join("custom.toml");
        std::fs::write(&path, "[network]\nport = 5000\nloss_percent = 10\n")
            .expect("Failed to write config");

        let config = ReplfsConfig::from_toml_file(&path).expect("Failed to read config");
        assert_eq!(config.network.port, 5000);
        assert_eq!(config.network.loss_percent, 10);
        assert_eq!(config.client, ClientSection::default());
    }

    #[test]
    fn test_toml_file_errors() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        let missing = temp_dir.path().join("missing.toml");
        assert!(matches!(
            ReplfsConfig::from_toml_file(&missing),
            Err(ConfigError::ReadError { .. })
        ));

        let broken = temp_dir.path().join("broken.toml");
        std::fs::write(&broken, "[network\nport = ").expect("Failed to write config");
        assert!(matches!(
            ReplfsConfig::from_toml_file(&broken),
            Err(ConfigError::ParseError { .. })
        ));
    }

    #[test]
    fn test_rendered_toml_reads_back() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        let path = temp_dir.path().join("rendered.toml");
        let mut config = ReplfsConfig::default();
        config.client.replicas = 3;
        std::fs::write(&path, config.to_toml_string().expect("Failed to render"))
            .expect("Failed to write config");

        assert_eq!(
            ReplfsConfig::from_toml_file(&path).expect("Failed to read config"),
            config
        );
    }
}
