//! Runtime environment detection.
//!
//! A service running inside a container must listen on every interface but
//! advertise the container's hostname, which is how its peers on the
//! container network reach it.

use std::path::Path;
use tracing::debug;

/// Where a service process believes it is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeEnv {
    Host,
    Container,
}

impl RuntimeEnv {
    /// Detect a container through `/.dockerenv` or the init cgroup.
    pub fn detect() -> Self {
        let cgroup = std::fs::read_to_string("/proc/1/cgroup").unwrap_or_default();
        Self::from_markers(Path::new("/.dockerenv").exists(), &cgroup)
    }

    fn from_markers(dockerenv: bool, cgroup: &str) -> Self {
        if dockerenv || cgroup.contains("docker") || cgroup.contains("containerd") {
            RuntimeEnv::Container
        } else {
            RuntimeEnv::Host
        }
    }

    pub fn is_container(&self) -> bool {
        matches!(self, RuntimeEnv::Container)
    }
}

/// Host to bind the listener on and host to advertise to the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindPlan {
    pub bind_host: String,
    pub advertise_host: String,
}

impl BindPlan {
    /// On a plain host both are `host`. In a container the listener goes on
    /// the wildcard address and the machine hostname is advertised.
    pub fn for_env(env: RuntimeEnv, host: &str) -> Self {
        match env {
            RuntimeEnv::Host => Self {
                bind_host: host.to_string(),
                advertise_host: host.to_string(),
            },
            RuntimeEnv::Container => {
                let advertise_host = hostname::get()
                    .ok()
                    .and_then(|h| h.into_string().ok())
                    .unwrap_or_else(|| host.to_string());
                debug!("Container detected, advertising hostname {}", advertise_host);
                Self {
                    bind_host: "0.0.0.0".to_string(),
                    advertise_host,
                }
            }
        }
    }
}
