//! replfs command line.
//!
//! # Quick Start
//!
//! ```bash
//! # One replica per host (each claims a fresh mount directory)
//! replfs server --mount /tmp/replfs-a
//!
//! # Write a file to three replicas, dropping 10% of packets on purpose
//! replfs put ./notes.txt --replicas 3 --drop 10
//! ```

mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use replfs::{ConfigLoader, ReplfsConfig};
use tracing::error;

/// replfs - replicated file writes over lossy UDP multicast.
#[derive(Parser)]
#[command(name = "replfs")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Read settings from this file instead of the layered configuration.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Flags shared by every command that talks to the group.
#[derive(clap::Args, Debug, Default)]
struct NetworkArgs {
    /// UDP port of the multicast group.
    #[arg(short, long)]
    port: Option<u16>,

    /// Percentage of outbound packets to drop (0-100).
    #[arg(short, long, value_parser = clap::value_parser!(u8).range(0..=100))]
    drop: Option<u8>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version information.
    Version,

    /// Run a replica.
    Server {
        #[command(flatten)]
        network: NetworkArgs,

        /// Directory that receives replicated files. Must not exist yet.
        #[arg(short, long)]
        mount: Option<PathBuf>,
    },

    /// Write a local file to every replica.
    Put {
        /// File to send.
        local: PathBuf,

        /// Name on the replicas (defaults to the local file name).
        #[arg(short, long)]
        name: Option<String>,

        #[command(flatten)]
        network: NetworkArgs,

        /// Exact number of replicas that must join.
        #[arg(short, long)]
        replicas: Option<usize>,
    },

    /// Print the effective configuration as TOML.
    Config,
}

impl NetworkArgs {
    fn apply(&self, config: &mut ReplfsConfig) {
        if let Some(port) = self.port {
            config.network.port = port;
        }
        if let Some(percent) = self.drop {
            config.network.loss_percent = percent;
        }
    }
}

fn load_config(path: Option<&PathBuf>) -> Result<ReplfsConfig> {
    match path {
        Some(path) => ReplfsConfig::from_toml_file(path)
            .with_context(|| format!("Failed to load {}", path.display())),
        None => ConfigLoader::new().load(),
    }
}

fn run(cli: Cli) -> Result<()> {
    let mut config = load_config(cli.config.as_ref())?;

    match cli.command {
        Commands::Version => {
            commands::version::run();
            Ok(())
        }
        Commands::Server { network, mount } => {
            network.apply(&mut config);
            if let Some(mount) = mount {
                config.server.mount = mount;
            }
            commands::server::run(&config)
        }
        Commands::Put {
            local,
            name,
            network,
            replicas,
        } => {
            network.apply(&mut config);
            if let Some(replicas) = replicas {
                config.client.replicas = replicas;
            }
            config.validate()?;
            commands::put::run(&config, &local, name.as_deref())
        }
        Commands::Config => commands::config::show(&config),
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}
