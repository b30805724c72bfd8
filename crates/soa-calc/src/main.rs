//! SOA Calc - reference calculator service.
//!
//! Registers as `calc` with the registry named by `SOA_SERVER_HOST` /
//! `SOA_SERVER_PORT` and serves `add`, `subtract`, `multiply`, `divide`
//! and `info` until interrupted.

mod calculator;

use anyhow::{Context, Result};
use clap::Parser;
use soa_core::{RegistryAddress, ServiceBuilder};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "soa-calc")]
#[command(about = "Calculator service for the SOA registry")]
struct Args {
    /// Host to bind to and advertise
    #[arg(long, default_value = "localhost")]
    host: String,

    /// Port to listen on (0 = auto-assign)
    #[arg(short, long, default_value = "8001")]
    port: u16,

    /// Bind and advertise exactly --host even inside a container
    #[arg(long)]
    no_container_detect: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

fn build_service(args: &Args, registry: RegistryAddress) -> ServiceBuilder {
    let builder = ServiceBuilder::new(calculator::SERVICE_NAME)
        .host(&args.host)
        .port(args.port)
        .description("Basic arithmetic")
        .version(env!("CARGO_PKG_VERSION"))
        .registry(registry)
        .container_aware(!args.no_container_detect)
        .info_method();
    calculator::install(builder)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.debug { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .init();

    let registry = RegistryAddress::from_env().context("Invalid registry environment")?;
    info!("Starting calculator service (registry {})", registry);

    let handle = build_service(&args, registry)
        .start()
        .await
        .with_context(|| format!("Failed to bind {}:{}", args.host, args.port))?;

    info!(
        "Calculator service '{}' running on {}",
        handle.name(),
        handle.addr()
    );

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received, stopping calculator service");
    handle.shutdown().await;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use soa_core::{RegistryServer, SoaClient};

    #[tokio::test]
    async fn test_calc_through_registry() {
        let registry = RegistryServer::new().start("127.0.0.1", 0).await.unwrap();
        let address = RegistryAddress::new("127.0.0.1", registry.port());

        let args = Args {
            host: "127.0.0.1".into(),
            port: 0,
            no_container_detect: true,
            debug: false,
        };
        let handle = build_service(&args, address.clone()).start().await.unwrap();
        assert!(handle.is_registered());

        let client = SoaClient::new(address);
        let sum = client.call("calc", "add", "10 5").await.unwrap();
        assert_eq!(sum.text(), "10 + 5 = 15");

        let typed = client.call("calc", "add", "2.50 1").await.unwrap();
        assert_eq!(typed.text(), "2.50 + 1 = 3.5");

        let err = client.call("calc", "divide", "1 0").await.unwrap();
        assert!(!err.is_success());
        assert_eq!(
            err.text(),
            "Error executing method 'divide': Division by zero is not allowed"
        );

        let info = client.call("calc", "info", "").await.unwrap();
        assert!(info.is_success());
        assert!(info.text().contains("\"divide\""));

        handle.shutdown().await;
    }

    #[test]
    fn test_default_args() {
        let args = Args::parse_from(["soa-calc", "--no-container-detect"]);
        assert_eq!(args.port, 8001);
        let _ = build_service(&args, RegistryAddress::default());
    }
}
