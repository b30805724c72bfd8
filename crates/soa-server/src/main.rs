//! SOA Server - the central registry and call gateway.
//!
//! Services register here on startup; clients send every call here and the
//! server forwards it to whichever service owns the routing key.

use anyhow::{Context, Result};
use clap::Parser;
use soa_core::{RegistryAddress, RegistryServer, TimeoutConfig};
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser, Debug)]
#[command(name = "soa-server")]
#[command(about = "Service registry and call gateway")]
struct Args {
    /// Host to bind to (defaults to SOA_SERVER_HOST, then localhost)
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on (defaults to SOA_SERVER_PORT, then 8000)
    #[arg(short, long)]
    port: Option<u16>,

    /// Give up on a proxied call after this many seconds (default: wait forever)
    #[arg(long)]
    proxy_timeout_secs: Option<u64>,

    /// Enable debug logging (RUST_LOG overrides)
    #[arg(short, long)]
    debug: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    log_json: bool,
}

fn init_logging(debug: bool, json: bool) {
    let default_level = if debug { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let builder = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false);
    if json {
        builder.json().init();
    } else {
        builder.compact().init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(args.debug, args.log_json);

    let defaults = RegistryAddress::from_env().context("Invalid registry environment")?;
    let host = args.host.unwrap_or(defaults.host);
    let port = args.port.unwrap_or(defaults.port);

    let timeouts = args
        .proxy_timeout_secs
        .map(|secs| TimeoutConfig::uniform(Duration::from_secs(secs)))
        .unwrap_or_default();

    info!("Starting SOA registry");

    let mut handle = RegistryServer::new()
        .with_timeouts(timeouts)
        .start(&host, port)
        .await
        .with_context(|| format!("Failed to bind registry on {}:{}", host, port))?;

    info!("Registry running on {}", handle.addr());

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received, exiting");

    if let Ok(entries) = handle.directory().list() {
        for (name, entry) in entries {
            info!("Still registered: {} at {}", name, entry.addr());
        }
    }
    handle.shutdown();
    handle.wait().await;

    Ok(())
}
