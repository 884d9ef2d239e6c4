//! Web application bootstrap with remote error log shipping.
//!
//! # Architecture Overview
//!
//! ```text
//!                        ┌───────────────────────────────────────────────┐
//!                        │                  log-shipper                  │
//!                        │                                               │
//!     Client Request     │  ┌──────────┐   ┌────────────┐   ┌─────────┐  │
//!     ───────────────────┼─▶│  axum +  │──▶│  observe   │──▶│ static  │  │
//!                        │  │ tower-http│   │ middleware │   │  files  │  │
//!                        │  └──────────┘   └─────┬──────┘   └─────────┘  │
//!                        │                       │ status ≥ threshold    │
//!                        │          metrics      ▼                       │
//!     Prometheus scrape  │  ┌──────────┐   ┌────────────┐               │
//!     ◀──────────────────┼──│ exporter │   │ Sequenced  │───────────────┼──▶ Remote log
//!                        │  └──────────┘   │ LogShipper │  append+token │    service
//!                        │                 └────────────┘               │
//!                        └───────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use log_shipper::config::load_or_default;
use log_shipper::observability::{logging, metrics};
use log_shipper::shipping::build_shipper;
use log_shipper::{HttpServer, Shutdown};

#[derive(Parser)]
#[command(name = "log-shipper")]
#[command(about = "Static web server that ships error responses to a remote log stream")]
struct Args {
    /// Path to a TOML configuration file; defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = load_or_default(args.config.as_deref())?;

    logging::init_logging(&config.observability);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = ?args.config,
        "log-shipper starting"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => {
                if let Err(e) = metrics::init_metrics(addr) {
                    tracing::error!(error = %e, "Failed to start metrics listener");
                }
            }
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let shipper = if config.shipper.enabled {
        let shipper = build_shipper(&config.shipper)?;
        tracing::info!(
            backend = ?config.shipper.backend,
            group = %config.shipper.group_name,
            stream = %config.shipper.stream_name,
            max_retries = config.shipper.max_retries,
            "Log shipping enabled"
        );
        Some(Arc::new(shipper))
    } else {
        tracing::info!("Log shipping disabled");
        None
    };

    let listener = TcpListener::bind(&config.listener.bind_address).await?;

    let shutdown = Shutdown::new();
    shutdown.trigger_on_signal();

    let server = HttpServer::new(config, shipper);
    server.run(listener, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
