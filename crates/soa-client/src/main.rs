//! SOA Client - call services through the registry from the command line.

mod repl;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use repl::ReplCommand;
use soa_core::{CallResponse, RegistryAddress, SoaClient};
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "soa-client")]
#[command(about = "Call services through the SOA registry")]
struct Args {
    /// Registry host (defaults to SOA_SERVER_HOST, then localhost)
    #[arg(long, global = true)]
    host: Option<String>,

    /// Registry port (defaults to SOA_SERVER_PORT, then 8000)
    #[arg(short, long, global = true)]
    port: Option<u16>,

    /// Print responses as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Call one method and print the response
    Call {
        service: String,
        method: String,
        /// Parameters, joined with single spaces
        params: Vec<String>,
    },
    /// Show a service's info and methods
    Methods { service: String },
    /// Read commands from stdin (the default)
    Interactive,
    /// Run the calculator operations
    Demo,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.debug { Level::DEBUG } else { Level::WARN };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let defaults = RegistryAddress::from_env().context("Invalid registry environment")?;
    let registry = RegistryAddress::new(
        args.host.unwrap_or(defaults.host),
        args.port.unwrap_or(defaults.port),
    );
    debug!("Using registry {}", registry);
    let client = SoaClient::new(registry);

    match args.command.unwrap_or(Command::Interactive) {
        Command::Call {
            service,
            method,
            params,
        } => {
            let response = call(&client, &service, &method, &params.join(" ")).await;
            print_response(&response, args.json)?;
            if !response.is_success() {
                std::process::exit(1);
            }
        }
        Command::Methods { service } => show_methods(&client, &service, args.json).await?,
        Command::Interactive => interactive(&client, args.json).await?,
        Command::Demo => demo(&client, args.json).await?,
    }

    Ok(())
}

/// Call through the registry, folding connection failures into an error response.
async fn call(client: &SoaClient, service: &str, method: &str, params: &str) -> CallResponse {
    client
        .call(service, method, params)
        .await
        .unwrap_or_else(|e| CallResponse::error(format!("Connection error: {}", e)))
}

fn print_response(response: &CallResponse, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(response)?);
    } else {
        match response {
            CallResponse::Success { result } => println!("Result: {}", result),
            CallResponse::Error { message } => println!("Error: {}", message),
        }
    }
    Ok(())
}

async fn show_methods(client: &SoaClient, service: &str, json: bool) -> Result<()> {
    let response = call(client, service, "info", "").await;
    if json || !response.is_success() {
        return print_response(&response, json);
    }

    let info: serde_json::Value = match serde_json::from_str(response.text()) {
        Ok(info) => info,
        // Not every service returns JSON from info
        Err(_) => return print_response(&response, false),
    };

    println!("Service: {}", info["service_name"].as_str().unwrap_or(service));
    if let Some(description) = info["description"].as_str() {
        println!("Description: {}", description);
    }
    if let Some(methods) = info["methods"].as_object() {
        println!("Methods:");
        for (name, doc) in methods {
            println!("  {:<12} {}", name, doc.as_str().unwrap_or(""));
        }
    }
    Ok(())
}

fn list_services() {
    println!("Known services (the registry does not offer discovery):");
    for (name, description, methods) in repl::KNOWN_SERVICES {
        println!("  {:<8} {}", name, description);
        println!("           methods: {}", methods.join(", "));
    }
}

async fn interactive(client: &SoaClient, json: bool) -> Result<()> {
    println!("SOA client connected to registry {}", client.registry());
    println!("{}", repl::HELP);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("soa> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            println!();
            break;
        };

        match ReplCommand::parse(&line) {
            ReplCommand::Empty => {}
            ReplCommand::Quit => break,
            ReplCommand::Help => println!("{}", repl::HELP),
            ReplCommand::List => list_services(),
            ReplCommand::Methods(service) => show_methods(client, &service, json).await?,
            ReplCommand::Call {
                service,
                method,
                params,
            } => {
                let response = call(client, &service, &method, &params).await;
                print_response(&response, json)?;
            }
            ReplCommand::Unknown(input) => {
                println!("Unrecognised command: {} (type 'help')", input);
            }
        }
    }
    Ok(())
}

async fn demo(client: &SoaClient, json: bool) -> Result<()> {
    let cases = [
        ("add", "10 5"),
        ("subtract", "15 8"),
        ("multiply", "7 8"),
        ("divide", "20 4"),
        ("divide", "1 0"),
    ];

    for (method, params) in cases {
        let response = call(client, "calc", method, params).await;
        if json {
            print_response(&response, true)?;
        } else {
            println!("calc {}({}) -> {}", method, params, response);
        }
    }
    Ok(())
}
