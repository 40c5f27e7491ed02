//! Relay binary: engine session in, WebSocket fan-out.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use engine_client::Session;
use engine_relay::config::ConfigLayer;
use engine_relay::server::ServerState;
use engine_relay::{producer, server, Hub, RelayConfig, TransportKind};
use engine_transport::{MulticastTransport, TcpTransport, Transport, UdpTransport};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, info};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Parser)]
#[clap(name = "engine-relay")]
#[clap(about = "Relays matching-engine events to WebSocket subscribers")]
struct Cli {
    /// Engine host
    #[clap(long)]
    engine_host: Option<String>,

    /// Engine port
    #[clap(long)]
    engine_port: Option<u16>,

    /// Engine transport: tcp, udp or multicast
    #[clap(short, long)]
    transport: Option<TransportKind>,

    /// Multicast group, as group or group:port
    #[clap(long)]
    multicast_group: Option<String>,

    /// IPv4 address of the multicast receive interface
    #[clap(long)]
    multicast_interface: Option<String>,

    /// WebSocket bind host
    #[clap(long)]
    ws_host: Option<String>,

    /// WebSocket bind port
    #[clap(long)]
    ws_port: Option<u16>,

    /// WebSocket path
    #[clap(long)]
    ws_path: Option<String>,

    /// Comma-separated event kinds to forward (default: all)
    #[clap(short, long)]
    filter: Option<String>,

    /// Config file (JSON)
    #[clap(short, long)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[clap(short, long)]
    verbose: bool,
}

impl Cli {
    fn layer(&self) -> ConfigLayer {
        ConfigLayer {
            engine_host: self.engine_host.clone(),
            engine_port: self.engine_port,
            transport: self.transport,
            multicast_group: self.multicast_group.clone(),
            multicast_interface: self.multicast_interface.clone(),
            ws_host: self.ws_host.clone(),
            ws_port: self.ws_port,
            ws_path: self.ws_path.clone(),
            filter: self
                .filter
                .as_ref()
                .map(|raw| raw.split(',').map(|s| s.trim().to_string()).collect()),
            verbose: self.verbose.then_some(true),
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match RelayConfig::load(cli.config.as_deref(), cli.layer()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("configuration error: {e:#}");
            return ExitCode::FAILURE;
        }
    };

    let default_level = if config.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .init();

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("relay failed: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: RelayConfig) -> Result<()> {
    let filter = config.filter_set()?;

    // Engine side first: no point accepting subscribers for a dead
    // producer.
    let mut session = Session::new(connect_engine(&config).await?);
    if config.transport == TransportKind::Tcp || config.transport == TransportKind::Udp {
        session
            .detect()
            .await
            .context("probing engine wire dialect")?;
    }

    let listener = TcpListener::bind(config.ws_addr())
        .await
        .with_context(|| format!("binding WebSocket listener on {}", config.ws_addr()))?;

    let hub = Hub::new();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let producer_handle = {
        let hub = hub.clone();
        let shutdown = shutdown_rx.clone();
        tokio::spawn(async move {
            producer::run(session, hub, filter, shutdown).await;
        })
    };

    let state = Arc::new(ServerState {
        hub: hub.clone(),
        ws_path: config.ws_path.clone(),
        started_at: Instant::now(),
    });

    let server_handle = {
        let shutdown = shutdown_rx.clone();
        tokio::spawn(async move { server::run(listener, state, shutdown).await })
    };

    info!(
        "relay up: engine {} over {}, subscribers at ws://{}{}",
        config.engine_addr(),
        config.transport,
        config.ws_addr(),
        config.ws_path
    );

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("interrupt received, shutting down");
        }
        _ = producer_handle => {
            info!("producer ended, shutting down");
        }
    }

    // Orderly shutdown: flag, listener, producer transport, then
    // close frames to subscribers.
    let _ = shutdown_tx.send(true);
    let _ = server_handle.await;
    hub.close_all().await;

    Ok(())
}

async fn connect_engine(config: &RelayConfig) -> Result<Box<dyn Transport>> {
    let transport: Box<dyn Transport> = match config.transport {
        TransportKind::Tcp => Box::new(
            TcpTransport::connect(&config.engine_addr(), CONNECT_TIMEOUT)
                .await
                .with_context(|| format!("connecting to engine at {}", config.engine_addr()))?,
        ),
        TransportKind::Udp => Box::new(
            UdpTransport::connect(&config.engine_addr())
                .await
                .with_context(|| format!("connecting to engine at {}", config.engine_addr()))?,
        ),
        TransportKind::Multicast => {
            let (group, port) = config.multicast_endpoint()?;
            let iface = config.multicast_iface()?;
            Box::new(
                MulticastTransport::join(group, port, iface)
                    .await
                    .with_context(|| format!("joining multicast group {group}:{port}"))?,
            )
        }
    };
    Ok(transport)
}
