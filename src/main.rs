//! Document Storage Gateway
//!
//! Stores and retrieves JSON documents in an object store, instrumenting
//! every operation with traces, correlated logs and metrics.
//!
//! # Architecture Overview
//!
//! ```text
//!                         ┌──────────────────────────────────────────────────┐
//!                         │                 DOC STORAGE GATEWAY              │
//!                         │                                                  │
//!     POST /data          │  ┌─────────┐   ┌───────────┐   ┌─────────────┐   │
//!     GET /data/{key}  ───┼─▶│  http   │──▶│ operation │──▶│   storage   │───┼──▶ Object
//!                         │  │ server  │   │ executor  │   │ (opendal)   │   │    Store
//!                         │  └─────────┘   └─────┬─────┘   └─────────────┘   │
//!                         │                      │                           │
//!                         │        ┌─────────────┼──────────────┐            │
//!                         │        ▼             ▼              ▼            │
//!                         │  ┌──────────┐  ┌──────────┐  ┌──────────┐        │
//!                         │  │ tracing  │  │ logging  │  │ metrics  │        │
//!                         │  │  (OTLP)  │  │  (Loki)  │  │ (/metrics│        │
//!                         │  └──────────┘  └──────────┘  └──────────┘        │
//!                         └──────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use doc_storage_gateway::config::load_config;
use doc_storage_gateway::lifecycle::signals::shutdown_signal;
use doc_storage_gateway::observability::logging::init_logging;
use doc_storage_gateway::Gateway;

#[derive(Parser)]
#[command(name = "doc-gateway")]
#[command(about = "JSON document storage gateway", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(short, long, env = "DOC_GATEWAY_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Load configuration
    let config = load_config(cli.config.as_deref())?;

    // Initialize tracing subscriber
    init_logging(&config.observability)?;

    tracing::info!(
        bind_address = %config.listener.bind_address,
        storage = ?config.storage.backend,
        trace_endpoint = ?config.observability.trace_endpoint,
        log_endpoint = ?config.observability.log_endpoint,
        "doc-gateway v{} starting",
        env!("CARGO_PKG_VERSION")
    );

    let gateway = Gateway::build(config.clone())?;

    // Bind TCP listener
    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(
        address = %listener.local_addr()?,
        "Listening for connections"
    );

    let shutdown = gateway.shutdown_handle();
    tokio::spawn(async move {
        shutdown_signal().await;
        shutdown.trigger();
    });

    gateway.run(listener).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
