//! API gateway binary.
//!
//! ```text
//!     Client Request
//!     ─────────▶ http server ──▶ endpoint handler ──▶ backend pipeline ──┬──▶ Backend A
//!                                                                       ├──▶ Backend B
//!     Client Response                                                   │
//!     ◀───────── render ◀────── finalize ◀──────── combiner ◀────────────┘
//! ```

use clap::Parser;
use std::path::PathBuf;
use tokio::net::TcpListener;

use gateway_proxy::config::loader::load_config;
use gateway_proxy::http::GatewayServer;
use gateway_proxy::lifecycle::{spawn_signal_listener, Shutdown};
use gateway_proxy::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "gateway-proxy")]
#[command(about = "API gateway aggregating backend responses", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "gateway.toml")]
    config: PathBuf,

    /// Validate the configuration and exit.
    #[arg(long)]
    check: bool,

    /// Override the listener port.
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = load_config(&cli.config)?;
    if let Some(port) = cli.port {
        let host = config
            .listener
            .bind_address
            .rsplit_once(':')
            .map(|(host, _)| host.to_string())
            .unwrap_or_else(|| "0.0.0.0".to_string());
        config.listener.bind_address = format!("{}:{}", host, port);
    }

    logging::init_logging(&config.observability);
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %cli.config.display(),
        "gateway-proxy starting"
    );

    // Builds every endpoint pipeline, so unknown combiners fail here.
    let server = GatewayServer::new(config.clone())?;
    if cli.check {
        tracing::info!(endpoints = config.endpoints.len(), "Configuration OK");
        return Ok(());
    }

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let shutdown = Shutdown::new();
    spawn_signal_listener(shutdown.clone());

    server.run(listener, shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
