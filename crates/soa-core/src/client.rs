//! Client side of the protocol.
//!
//! Each operation opens a fresh connection to the registry, sends one frame,
//! reads one reply and closes. There is no pooling and no retry.

use crate::config::{RegistryAddress, TimeoutConfig};
use crate::protocol::{
    create_call_request, create_registration, create_unregistration, parse_response, CallResponse,
};
use crate::transport::exchange;
use crate::Result;
use tracing::debug;

/// Talks to a registry at a fixed address.
#[derive(Debug, Clone, Default)]
pub struct SoaClient {
    registry: RegistryAddress,
    timeouts: TimeoutConfig,
}

impl SoaClient {
    pub fn new(registry: RegistryAddress) -> Self {
        Self {
            registry,
            timeouts: TimeoutConfig::default(),
        }
    }

    /// Registry address from `SOA_SERVER_HOST` / `SOA_SERVER_PORT`.
    pub fn from_env() -> Result<Self> {
        Ok(Self::new(RegistryAddress::from_env()?))
    }

    pub fn with_timeouts(mut self, timeouts: TimeoutConfig) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn registry(&self) -> &RegistryAddress {
        &self.registry
    }

    /// Call `method` on `service` through the registry.
    ///
    /// Protocol-level failures (unknown service, handler errors, a dead
    /// downstream) come back as [`CallResponse::Error`]. `Err` means the
    /// registry itself could not be reached.
    pub async fn call(&self, service: &str, method: &str, params: &str) -> Result<CallResponse> {
        let frame = create_call_request(service, method, params)?;
        let reply = self.send(&frame).await?;
        Ok(parse_response(&reply))
    }

    /// Send a registration control frame.
    pub async fn register(
        &self,
        name: &str,
        host: &str,
        port: u16,
        description: &str,
    ) -> Result<CallResponse> {
        let frame = create_registration(name, host, port, description)?;
        Ok(parse_response(&self.send(&frame).await?))
    }

    /// Send an unregistration control frame.
    pub async fn unregister(&self, name: &str) -> Result<CallResponse> {
        let frame = create_unregistration(name)?;
        Ok(parse_response(&self.send(&frame).await?))
    }

    /// Send an already-encoded frame and return the raw reply.
    pub async fn send(&self, frame: &str) -> Result<String> {
        debug!("Sending to registry {}: {}", self.registry, frame);
        let reply = exchange(&self.registry.host, self.registry.port, frame, self.timeouts).await?;
        debug!("Registry replied: {}", reply);
        Ok(reply)
    }
}

/// One-shot call using the registry address from the environment.
///
/// Never fails: connection problems are folded into an error response.
pub async fn call_service(service: &str, method: &str, params: &str) -> CallResponse {
    let client = match SoaClient::from_env() {
        Ok(client) => client,
        Err(e) => return CallResponse::error(e.to_string()),
    };
    client
        .call(service, method, params)
        .await
        .unwrap_or_else(|e| CallResponse::error(format!("Connection error: {}", e)))
}
