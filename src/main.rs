use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use metrics::Metrics;
use metrics::server::{MetricsServerConfig, run_metrics_server};
use networking::gossipsub::config::GossipsubConfig;
use networking::network::{NetworkService, NetworkServiceConfig};
use networking::tx_gossip::{TxGossip, TxGossipConfig};
use tokio::task;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tx_index::{MemoryIndex, SharedIndex};

#[derive(Parser, Debug)]
struct Args {
    #[arg(short, long, default_value = "127.0.0.1")]
    address: IpAddr,

    #[arg(short, long, default_value_t = 8083)]
    port: u16,

    /// Multiaddr of a bootnode, or a YAML file listing multiaddrs.
    #[arg(short, long)]
    bootnodes: Vec<String>,

    /// Peers only gossip with nodes on the same network.
    #[arg(short, long, default_value = "devnet0")]
    network: String,

    #[arg(long, default_value_t = 10)]
    announce_interval_secs: u64,

    #[arg(long, default_value_t = false)]
    metrics: bool,

    #[arg(long, default_value = "127.0.0.1")]
    metrics_address: IpAddr,

    #[arg(long, default_value_t = 5054)]
    metrics_port: u16,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let cancel = CancellationToken::new();

    let metrics = args.metrics.then(|| Arc::new(Metrics::new()));
    let index: SharedIndex = Arc::new(MemoryIndex::new());

    let network_service_config = Arc::new(NetworkServiceConfig::new(
        GossipsubConfig::new(),
        args.address,
        args.port,
        args.bootnodes,
        args.network,
    ));
    let mut network_service =
        NetworkService::new(network_service_config, index.clone(), metrics.clone())
            .context("Failed to create network service")?;

    let network = network_service.handle();
    let local_peer_id = network.local_peer_id();
    info!(peer = %local_peer_id, "Starting node");

    let network_task = task::spawn({
        let cancel = cancel.clone();
        async move { network_service.start(cancel).await }
    });

    let metrics_task = metrics.clone().map(|metrics| {
        let config = MetricsServerConfig {
            metrics_address: args.metrics_address,
            metrics_port: args.metrics_port,
        };
        task::spawn(run_metrics_server(config, metrics, cancel.clone()))
    });

    let gossip_config = TxGossipConfig::default()
        .with_announce_interval(Duration::from_secs(args.announce_interval_secs));
    let gossip = TxGossip::new(gossip_config, index, local_peer_id)
        .with_metrics(metrics)
        .start(&network, Arc::new(network.clone()), cancel.child_token())
        .await
        .context("Failed to start transaction gossip")?;

    let gossip_cancel = gossip.cancellation_token().clone();
    let gossip_exit = gossip.join();
    tokio::pin!(gossip_exit);

    // Gossip tasks stop first, they still need the swarm to leave the topic.
    let exit = tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            if let Err(err) = signal {
                warn!(%err, "Failed to listen for shutdown signal");
            }
            info!("Shutting down");
            gossip_cancel.cancel();
            gossip_exit.await
        }
        exit = &mut gossip_exit => {
            warn!("Transaction gossip stopped, shutting down");
            exit
        }
    };
    if let Err(err) = &exit.listener {
        warn!(%err, "Listener exited with error");
    }

    cancel.cancel();

    network_task
        .await
        .context("Network task panicked")?
        .context("Network service failed")?;

    if let Some(metrics_task) = metrics_task {
        metrics_task
            .await
            .context("Metrics task panicked")?
            .context("Metrics server failed")?;
    }

    exit.announcer.context("Transaction gossip failed")?;

    Ok(())
}
