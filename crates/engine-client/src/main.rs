//! Interactive client and scenario runner for the matching engine.

mod repl;

use std::process::ExitCode;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use engine_client::{run_scenario, Protocol, Session};
use engine_transport::{TcpTransport, Transport, UdpTransport};
use tracing::info;

#[derive(Parser)]
#[clap(name = "engine-client")]
#[clap(about = "Interactive client and load-scenario driver for the matching engine")]
struct Cli {
    /// Engine address (host:port)
    #[clap(short, long, default_value = "127.0.0.1:9000")]
    server: String,

    /// Transport: tcp or udp
    #[clap(short, long, default_value = "tcp")]
    transport: String,

    /// Run one scenario and exit (exit code reflects the verdict)
    #[clap(long)]
    scenario: Option<u32>,

    /// Skip discovery and force a protocol: binary or csv
    #[clap(long)]
    protocol: Option<String>,

    /// Connect timeout in seconds
    #[clap(long, default_value = "5")]
    connect_timeout: u64,

    /// Enable debug logging
    #[clap(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .init();

    match run(cli).await {
        Ok(passed) => {
            if passed {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<bool> {
    let transport: Box<dyn Transport> = match cli.transport.as_str() {
        "tcp" => Box::new(
            TcpTransport::connect(&cli.server, Duration::from_secs(cli.connect_timeout)).await?,
        ),
        "udp" => Box::new(UdpTransport::connect(&cli.server).await?),
        other => anyhow::bail!("unknown transport {other:?} (expected tcp or udp)"),
    };

    let mut session = Session::new(transport);

    match cli.protocol.as_deref() {
        Some("binary") => session.set_protocol(Protocol::Binary),
        Some("csv") => session.set_protocol(Protocol::Csv),
        Some(other) => anyhow::bail!("unknown protocol {other:?} (expected binary or csv)"),
        None => {
            info!("probing {} for its wire dialect...", cli.server);
            session.detect().await?;
        }
    }

    if let Some(id) = cli.scenario {
        let outcome = run_scenario(&mut session, id).await;
        session.close().await;
        return Ok(outcome.passed());
    }

    repl::run(&mut session).await?;
    session.close().await;
    Ok(true)
}
