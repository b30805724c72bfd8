//! SOA Core - a small service-oriented RPC substrate over plain TCP.
//!
//! Services register themselves with a central registry, and clients reach
//! them by sending length-prefixed text frames to that registry, which
//! proxies each call over a second connection. Every exchange is one
//! connection carrying one request and one response.
//!
//! # Example
//!
//! ```rust,ignore
//! use soa_core::{RegistryServer, ServiceBuilder, SoaClient, RegistryAddress};
//! use soa_core::service::{ArgumentError, CallArgs};
//!
//! #[tokio::main]
//! async fn main() -> soa_core::Result<()> {
//!     let registry = RegistryServer::new().start("127.0.0.1", 8000).await?;
//!
//!     let echo = ServiceBuilder::new("echo")
//!         .host("127.0.0.1")
//!         .method("echo", |args: CallArgs| Ok::<_, ArgumentError>(args.one()?))
//!         .start()
//!         .await?;
//!
//!     let client = SoaClient::new(RegistryAddress::new("127.0.0.1", 8000));
//!     let response = client.call("echo", "echo", "42").await?;
//!     println!("{}", response);
//!
//!     echo.shutdown().await;
//!     drop(registry);
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod platform;
pub mod protocol;
pub mod registry;
pub mod service;
pub mod transport;

// Re-export commonly used types
pub use client::{call_service, SoaClient};
pub use config::{ProtocolConfig, RegistryAddress, RegistryConfig, TimeoutConfig};
pub use error::{Result, SoaError};
pub use protocol::{CallResponse, Frame, Request, ServiceName, Status};
pub use registry::{RegistryEntry, RegistryHandle, RegistryServer, ServiceDirectory};
pub use service::{CallArgs, DispatchStrategy, ServiceBuilder, ServiceHandle};
