//! Centralized configuration for the registry substrate.
//!
//! Wire constants, registry defaults and the environment variables a service
//! runtime consults to find the registry.

use crate::{Result, SoaError};
use std::fmt;
use std::time::Duration;

/// Wire-format constants.
pub struct ProtocolConfig;

impl ProtocolConfig {
    /// Width of the zero-padded length prefix.
    pub const LEN_DIGITS: usize = 5;
    /// Width of the service name field.
    pub const SERVICE_WIDTH: usize = 5;
    /// Largest content length the prefix can express.
    pub const MAX_CONTENT_LEN: usize = 99_999;
    /// Every connection is served by a single read of this many bytes.
    pub const RECV_BUFFER_SIZE: usize = 4096;
    /// Service field selecting a registration.
    pub const REGISTER_SELECTOR: &'static str = "rgstr";
    /// Service field selecting an unregistration.
    pub const UNREGISTER_SELECTOR: &'static str = "unrgs";
    /// Prefix of an unregistration payload.
    pub const UNREGISTER_PREFIX: &'static str = "unregister:";
    /// Service field used for control acknowledgements and protocol errors.
    pub const SERVER_CONTEXT: &'static str = "srvr";
}

/// Registry location defaults.
pub struct RegistryConfig;

impl RegistryConfig {
    pub const DEFAULT_HOST: &'static str = "localhost";
    pub const DEFAULT_PORT: u16 = 8000;
    pub const HOST_ENV: &'static str = "SOA_SERVER_HOST";
    pub const PORT_ENV: &'static str = "SOA_SERVER_PORT";
}

/// Where the registry listens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryAddress {
    pub host: String,
    pub port: u16,
}

impl RegistryAddress {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Resolve the registry address from `SOA_SERVER_HOST` / `SOA_SERVER_PORT`,
    /// falling back to `localhost:8000`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an injectable variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let host = lookup(RegistryConfig::HOST_ENV)
            .filter(|h| !h.is_empty())
            .unwrap_or_else(|| RegistryConfig::DEFAULT_HOST.to_string());

        let port = match lookup(RegistryConfig::PORT_ENV) {
            Some(raw) => raw.trim().parse::<u16>().map_err(|e| SoaError::Config {
                message: format!("{}={:?} is not a valid port: {}", RegistryConfig::PORT_ENV, raw, e),
            })?,
            None => RegistryConfig::DEFAULT_PORT,
        };

        Ok(Self { host, port })
    }
}

impl Default for RegistryAddress {
    fn default() -> Self {
        Self::new(RegistryConfig::DEFAULT_HOST, RegistryConfig::DEFAULT_PORT)
    }
}

impl fmt::Display for RegistryAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Optional limits on outbound hops.
///
/// Both default to `None`: a hung peer blocks its connection task
/// indefinitely, which is the historical behaviour.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeoutConfig {
    pub connect: Option<Duration>,
    pub read: Option<Duration>,
}

impl TimeoutConfig {
    /// Apply the same limit to connect and read.
    pub fn uniform(limit: Duration) -> Self {
        Self {
            connect: Some(limit),
            read: Some(limit),
        }
    }
}
