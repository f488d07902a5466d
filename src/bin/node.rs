//! Node binary

use beaconkv::common::config::{Config, RedirectConfig};
use beaconkv::Coordinator;
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "beaconkv-node")]
#[command(about = "beaconkv node: liveness, leader resolution and a replicated KV store")]
#[command(version)]
struct Cli {
    /// Config file (overrides BEACONKV_CONFIG)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Node ID
    #[arg(long)]
    id: Option<u64>,

    /// Peer hostnames (comma-separated, e.g. node-2,node-3)
    #[arg(long, value_delimiter = ',')]
    peers: Option<Vec<String>>,

    /// Coordination port shared by all nodes
    #[arg(long)]
    port: Option<u16>,

    /// Bind host for HTTP
    #[arg(long)]
    bind_host: Option<String>,

    /// Redirect clients to http://<host>:<base+leader_id> instead of the leader's hostname
    #[arg(long, value_name = "HOST")]
    redirect_host: Option<String>,

    /// Log level when RUST_LOG is unset
    #[arg(long)]
    log_level: Option<String>,
}

impl Cli {
    fn apply(self, mut config: Config) -> Config {
        if let Some(id) = self.id {
            config.node_id = id;
        }
        if let Some(peers) = self.peers {
            config.peers = peers.into_iter().filter(|p| !p.trim().is_empty()).collect();
        }
        if let Some(port) = self.port {
            config.coord_port = port;
        }
        if let Some(host) = self.bind_host {
            config.bind_host = host;
        }
        if let Some(host) = self.redirect_host {
            config.redirect = RedirectConfig::PortOffset {
                host,
                base_port: None,
            };
        }
        if let Some(level) = self.log_level {
            config.log_level = level;
        }
        config
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Ctrl-C received, shutting down");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_from(Some(path), true)?,
        None => Config::load()?,
    };
    let config = cli.apply(config);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log_level.as_str().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("--- STARTING NODE {} ---", config.node_id);
    tracing::info!("--- PEERS: {:?} ---", config.peers);

    let node = Coordinator::new(&config)?;
    node.serve(shutdown_signal()).await?;

    Ok(())
}
