//! Configuration loader with multi-source merging

use crate::{Paths, ReplfsConfig};
use anyhow::{Context, Result};
use std::env;
use std::path::{Path, PathBuf};

/// Configuration loader with builder pattern
pub struct ConfigLoader {
    project_dir: PathBuf,
    env_prefix: String,
    user_config: bool,
}

impl ConfigLoader {
    /// Create a new config loader with default project directory (current dir)
    pub fn new() -> Self {
        Self {
            project_dir: env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            env_prefix: "REPLFS".to_string(),
            user_config: true,
        }
    }

    /// Set the project directory
    pub fn with_project_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.project_dir = dir.as_ref().to_path_buf();
        self
    }

    /// Set the environment variable prefix (default: "REPLFS")
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// Skip ~/.config/replfs/config.toml
    pub fn without_user_config(mut self) -> Self {
        self.user_config = false;
        self
    }

    /// Load configuration from all sources with proper precedence
    pub fn load(self) -> Result<ReplfsConfig> {
        let mut builder = config::Config::builder();

        // 1. Start with built-in defaults
        let defaults = ReplfsConfig::default();
        builder = builder.add_source(config::Config::try_from(&defaults)?);

        // 2. User config (~/.config/replfs/config.toml)
        if self.user_config {
            if let Ok(user_config_file) = Paths::new().user_config_file() {
                if user_config_file.exists() {
                    builder = builder.add_source(
                        config::File::from(user_config_file)
                            .required(false)
                            .format(config::FileFormat::Toml),
                    );
                }
            }
        }

        // 3. Project config (replfs.toml)
        let project_config_file = Paths::project_config_file(&self.project_dir);
        if project_config_file.exists() {
            builder = builder.add_source(
                config::File::from(project_config_file)
                    .required(false)
                    .format(config::FileFormat::Toml),
            );
        }

        // 4. Local config (replfs.local.toml, gitignored)
        let local_config_file = Paths::local_config_file(&self.project_dir);
        if local_config_file.exists() {
            builder = builder.add_source(
                config::File::from(local_config_file)
                    .required(false)
                    .format(config::FileFormat::Toml),
            );
        }

        // 5. Environment variables (REPLFS_NETWORK__LOSS_PERCENT=20)
        builder = builder.add_source(
            config::Environment::with_prefix(&self.env_prefix)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build().context("Failed to build configuration")?;

        let mut replfs_config: ReplfsConfig = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        replfs_config.validate()?;
        replfs_config.resolve_paths(&self.project_dir);

        Ok(replfs_config)
    }

    /// Load configuration or return defaults if not found
    pub fn load_or_default(self) -> ReplfsConfig {
        self.load().unwrap_or_default()
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn loader(project_dir: &Path) -> ConfigLoader {
        // A prefix no environment sets keeps these tests hermetic.
        ConfigLoader::new()
            .with_project_dir(project_dir)
            .with_env_prefix("REPLFS_TEST_UNSET")
            .without_user_config()
    }

    #[test]
    fn test_load_defaults() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        let config = loader(temp_dir.path()).load().expect("Failed to load config");

        assert_eq!(config.network.port, 44022);
        assert_eq!(config.client.replicas, 1);
        assert_eq!(config.server.mount, temp_dir.path().join("replfs-mount"));
    }

    #[test]
    fn test_load_project_config() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        let project_dir = temp_dir.path();

        let config_content = r#"
[network]
port = 45000
loss_percent = 20

[client]
replicas = 3
"#;
        fs::write(project_dir.join("replfs.toml"), config_content)
            .expect("Failed to write config");

        let config = loader(project_dir).load().expect("Failed to load config");

        assert_eq!(config.network.port, 45000);
        assert_eq!(config.network.loss_percent, 20);
        assert_eq!(config.client.replicas, 3);
        assert_eq!(config.client.max_attempts, 10);
    }

    #[test]
    fn test_local_overrides() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        let project_dir = temp_dir.path();

        fs::write(
            project_dir.join("replfs.toml"),
            r#"
[server]
mount = "/tmp/replica-a"
"#,
        )
        .expect("Failed to write project config");

        fs::write(
            project_dir.join("replfs.local.toml"),
            r#"
[server]
mount = "/tmp/replica-b"
"#,
        )
        .expect("Failed to write local config");

        let config = loader(project_dir).load().expect("Failed to load config");

        assert_eq!(config.server.mount, PathBuf::from("/tmp/replica-b"));
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        let project_dir = temp_dir.path();
        fs::write(
            project_dir.join("replfs.toml"),
            "[client]\nreplicas = 0\n",
        )
        .expect("Failed to write config");

        assert!(loader(project_dir).load().is_err());
        assert_eq!(loader(project_dir).load_or_default(), ReplfsConfig::default());
    }
}
