//! CLI binary to run a minicluster node.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::redundant_pub_crate)]

mod logging;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use minicluster_config::Config;
use minicluster_discovery::{BindProbe, PeerDiscoverer};
use minicluster_engine::EngineSupervisor;
use minicluster_etcd::{EtcdEngine, EtcdOptions, HttpAdminConnector};
use minicluster_membership::ClusterJoinCoordinator;
use minicluster_node::{NodeBuilder, RemovalPolicy};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// CLI-specific error type
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Configuration error
    #[error(transparent)]
    Config(#[from] minicluster_config::Error),

    /// Configured log level is not a valid filter
    #[error("invalid log level: {0}")]
    LogLevel(String),

    /// No configuration file given and no home directory to default to
    #[error("no --config given and HOME is not set")]
    NoConfigPath,

    /// Node lifecycle error
    #[error(transparent)]
    Node(#[from] minicluster_node::Error),
}

#[derive(Clone, Debug, Parser)]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the YAML configuration file [default: $HOME/config.yml]
    #[arg(long, global = true, env = "MINICLUSTER_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Debug, Subcommand)]
enum Command {
    /// Run the node until SIGTERM or SIGINT
    Serve,
}

impl Args {
    fn config_path(&self) -> Result<PathBuf, Error> {
        match &self.config {
            Some(path) => Ok(path.clone()),
            None => std::env::var_os("HOME")
                .map(|home| Path::new(&home).join("config.yml"))
                .ok_or(Error::NoConfigPath),
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    let log = logging::init();

    let result = match args.command {
        Command::Serve => serve(&args, &log).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("minicluster: {e}");
            ExitCode::from(1)
        }
    }
}

async fn serve(args: &Args, log: &logging::LogHandle) -> Result<(), Error> {
    let path = args.config_path()?;
    info!(path = %path.display(), "loading configuration");

    let config = Config::from_file(&path)?;
    log.apply_level(&config.log.level)?;

    let shutdown_token = CancellationToken::new();
    let signal_shutdown_token = shutdown_token.clone();
    tokio::spawn(async move {
        wait_for_signal().await;

        info!("Shutting down");
        signal_shutdown_token.cancel();
    });

    let discoverer = PeerDiscoverer::with_probe(
        BindProbe,
        config.port_pairs()?,
        config.discovery.probe_policy,
    );
    let coordinator = ClusterJoinCoordinator::new(HttpAdminConnector, config.dial_timeout());
    let supervisor = EngineSupervisor::new(
        EtcdEngine::new(EtcdOptions {
            bin_dir: config.engine.bin_dir.clone(),
            ..EtcdOptions::default()
        }),
        config.ready_timeout(),
    );

    let node = NodeBuilder::new()
        .with_identity(config.identity()?)
        .with_seed_hosts(config.discovery.seed_hosts.clone())
        .with_discoverer(discoverer)
        .with_coordinator(coordinator)
        .with_supervisor(supervisor)
        .with_removal_policy(RemovalPolicy {
            attempts: config.shutdown.removal_attempts,
            backoff: config.removal_backoff(),
            required: config.shutdown.removal_required,
        })
        .build()?;

    node.run(shutdown_token).await.map_err(|e| {
        error!("node stopped with error: {}", e);
        Error::Node(e)
    })
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    let (mut sigterm, mut sigint) = match (
        signal(SignalKind::terminate()),
        signal(SignalKind::interrupt()),
    ) {
        (Ok(sigterm), Ok(sigint)) => (sigterm, sigint),
        (Err(e), _) | (_, Err(e)) => {
            error!("failed to install signal handlers: {}", e);
            return std::future::pending().await;
        }
    };

    tokio::select! {
        _ = sigterm.recv() => info!("Received SIGTERM"),
        _ = sigint.recv() => info!("Received SIGINT"),
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("Received interrupt signal");
}

#[cfg(test)]
mod tests {
    use super::*;

    use clap::CommandFactory;
    use pretty_assertions::assert_eq;

    #[test]
    fn args_are_well_formed() {
        Args::command().debug_assert();
    }

    #[test]
    fn config_flag_is_global() {
        let args = Args::try_parse_from(["minicluster", "serve", "--config", "/etc/node.yml"])
            .unwrap();

        assert!(matches!(args.command, Command::Serve));
        assert_eq!(args.config_path().unwrap(), PathBuf::from("/etc/node.yml"));
    }

    #[test]
    fn serve_is_required() {
        assert!(Args::try_parse_from(["minicluster"]).is_err());
        assert!(Args::try_parse_from(["minicluster", "serve", "--name", "n1"]).is_err());
    }
}
