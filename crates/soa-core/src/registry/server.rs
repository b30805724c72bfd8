//! Registry/gateway server.
//!
//! Accepts one frame per connection. Control frames update the
//! [`ServiceDirectory`]; call frames are forwarded to the registered service
//! over a fresh outbound connection and its reply is relayed back.
//!
//! # Thread Safety
//!
//! Each connection is handled in its own spawned task. The directory is the
//! only shared state and its lock is released before the proxy hop, so a slow
//! downstream service stalls exactly one connection task.

use super::directory::{RegistryEntry, ServiceDirectory};
use crate::config::{ProtocolConfig, TimeoutConfig};
use crate::protocol::{create_call_request, parse_request, parse_response};
use crate::protocol::{CallResponse, Request, ServiceName};
use crate::transport::{exchange, read_message, write_message};
use crate::{Result, SoaError};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

/// Handle to a running registry. Dropping shuts it down.
pub struct RegistryHandle {
    pub addr: SocketAddr,
    directory: ServiceDirectory,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task_handle: Option<tokio::task::JoinHandle<()>>,
}

impl RegistryHandle {
    /// Address the registry is listening on.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// The live directory backing this registry.
    pub fn directory(&self) -> &ServiceDirectory {
        &self.directory
    }

    /// Stop accepting connections. Calls already in flight finish on their own.
    pub fn shutdown(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }

    /// Wait for the accept loop to exit.
    pub async fn wait(mut self) {
        if let Some(handle) = self.task_handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for RegistryHandle {
    fn drop(&mut self) {
        self.shutdown();
        if let Some(handle) = self.task_handle.take() {
            handle.abort();
        }
    }
}

/// The registry/gateway.
#[derive(Debug, Clone, Default)]
pub struct RegistryServer {
    directory: ServiceDirectory,
    timeouts: TimeoutConfig,
}

impl RegistryServer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Limit the proxy hop. Without this a hung service blocks its caller forever.
    pub fn with_timeouts(mut self, timeouts: TimeoutConfig) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn directory(&self) -> &ServiceDirectory {
        &self.directory
    }

    /// Bind `host:port` and start accepting in the background.
    ///
    /// Bind failure is the only fatal error; everything after that is
    /// answered with an `NK` frame.
    pub async fn start(self, host: &str, port: u16) -> Result<RegistryHandle> {
        let listener = TcpListener::bind((host, port)).await?;
        let addr = listener.local_addr()?;

        info!("Registry listening on {}", addr);

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let directory = self.directory.clone();
        let task_handle = tokio::spawn(Self::accept_loop(listener, Arc::new(self), shutdown_rx));

        Ok(RegistryHandle {
            addr,
            directory,
            shutdown_tx: Some(shutdown_tx),
            task_handle: Some(task_handle),
        })
    }

    async fn accept_loop(
        listener: TcpListener,
        server: Arc<Self>,
        mut shutdown_rx: oneshot::Receiver<()>,
    ) {
        loop {
            tokio::select! {
                _ = &mut shutdown_rx => {
                    info!("Registry shutting down");
                    break;
                }
                accept_result = listener.accept() => {
                    match accept_result {
                        Ok((stream, peer_addr)) => {
                            let server = server.clone();
                            tokio::spawn(async move {
                                debug!("Registry connection from {}", peer_addr);
                                if let Err(e) = server.handle_connection(stream).await {
                                    debug!("Registry connection {} ended: {}", peer_addr, e);
                                }
                            });
                        }
                        Err(e) => {
                            error!("Registry accept error: {}", e);
                        }
                    }
                }
            }
        }
    }

    async fn handle_connection(&self, mut stream: TcpStream) -> Result<()> {
        let response = match read_message(&mut stream).await {
            Ok(Some(raw)) => {
                debug!("Registry received {}", raw);
                self.process_frame(&raw).await
            }
            Ok(None) => return Ok(()),
            Err(e) => {
                warn!("Unreadable frame: {}", e);
                server_error(&e).to_frame_lossy(ProtocolConfig::SERVER_CONTEXT)
            }
        };

        debug!("Registry sending {}", response);
        write_message(&mut stream, &response).await
    }

    /// Handle one raw inbound frame and return the response frame.
    pub async fn process_frame(&self, raw: &str) -> String {
        let request = match parse_request(raw) {
            Ok(request) => request,
            Err(e) => {
                warn!("Rejecting frame {:?}: {}", raw, e);
                return server_error(&e).to_frame_lossy(ProtocolConfig::SERVER_CONTEXT);
            }
        };

        let outcome = match &request {
            Request::Register {
                name,
                host,
                port,
                description,
            } => self.register(name, host, *port, description),
            Request::Unregister { name } => self.unregister(name),
            Request::Call {
                service,
                method,
                params,
            } => self.call_service(service, method, params).await,
        };

        let outcome = outcome.unwrap_or_else(|e| server_error(&e));
        outcome.to_frame_lossy(request.response_context())
    }

    fn register(
        &self,
        name: &ServiceName,
        host: &str,
        port: u16,
        description: &str,
    ) -> Result<CallResponse> {
        if name.is_control() {
            warn!("Refusing registration under reserved name {}", name);
            return Err(SoaError::invalid_control("reserved service name"));
        }

        let entry = RegistryEntry::new(host, port, description);
        if let Some(previous) = self.directory.register(name.clone(), entry)? {
            info!(
                "Service {} re-registered at {}:{} (was {})",
                name,
                host,
                port,
                previous.addr()
            );
        } else {
            info!("Service {} registered at {}:{}", name, host, port);
        }
        Ok(CallResponse::success(format!(
            "Service {} registered successfully",
            name
        )))
    }

    fn unregister(&self, name: &ServiceName) -> Result<CallResponse> {
        match self.directory.unregister(name)? {
            Some(_) => {
                info!("Service {} unregistered", name);
                Ok(CallResponse::success(format!(
                    "Service {} unregistered successfully",
                    name
                )))
            }
            None => Ok(CallResponse::error(
                SoaError::UnknownService {
                    name: name.to_string(),
                }
                .to_string(),
            )),
        }
    }

    async fn call_service(
        &self,
        service: &ServiceName,
        method: &str,
        params: &str,
    ) -> Result<CallResponse> {
        if method.is_empty() {
            return Ok(CallResponse::error(
                "Missing required fields: service_name, method",
            ));
        }

        // Copy the entry out so the lock is not held across the hop
        let Some(entry) = self.directory.lookup(service)? else {
            return Ok(CallResponse::error(
                SoaError::UnknownService {
                    name: service.to_string(),
                }
                .to_string(),
            ));
        };

        let request = create_call_request(service.as_field(), method, params)?;
        match exchange(&entry.host, entry.port, &request, self.timeouts).await {
            Ok(reply) => Ok(parse_response(&reply)),
            Err(e) => {
                let err = SoaError::DownstreamUnreachable {
                    service: service.to_string(),
                    addr: entry.addr(),
                    message: e.to_string(),
                };
                error!("{}", err);
                Ok(CallResponse::error(err.to_string()))
            }
        }
    }
}

fn server_error(err: &SoaError) -> CallResponse {
    CallResponse::error(format!("Server error: {}", err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{create_registration, create_unregistration, decode, Status};

    #[tokio::test]
    async fn test_register_acknowledged_under_server_context() {
        let server = RegistryServer::new();
        let frame = create_registration("calc", "localhost", 8001, "math").unwrap();

        let reply = decode(&server.process_frame(&frame).await).unwrap();
        assert_eq!(reply.service.trimmed(), "srvr");
        assert_eq!(reply.status, Some(Status::Ok));
        assert_eq!(reply.data, "Service calc registered successfully");
        assert_eq!(server.directory().len(), 1);
    }

    #[tokio::test]
    async fn test_register_twice_last_write_wins() {
        let server = RegistryServer::new();
        for port in [8001, 8002] {
            let frame = create_registration("calc", "localhost", port, "").unwrap();
            let reply = decode(&server.process_frame(&frame).await).unwrap();
            assert_eq!(reply.status, Some(Status::Ok));
        }
        let entry = server
            .directory()
            .lookup(&ServiceName::new("calc"))
            .unwrap()
            .unwrap();
        assert_eq!(entry.port, 8002);
    }

    #[tokio::test]
    async fn test_unregister_unknown_is_not_found() {
        let server = RegistryServer::new();
        let frame = create_unregistration("ghost").unwrap();

        let reply = decode(&server.process_frame(&frame).await).unwrap();
        assert_eq!(reply.status, Some(Status::Nk));
        assert!(reply.data.contains("not found"));
    }

    #[tokio::test]
    async fn test_unregister_known() {
        let server = RegistryServer::new();
        server
            .process_frame(&create_registration("calc", "localhost", 8001, "").unwrap())
            .await;

        let reply = decode(&server.process_frame(&create_unregistration("calc").unwrap()).await)
            .unwrap();
        assert_eq!(reply.status, Some(Status::Ok));
        assert!(server.directory().is_empty());
    }

    #[tokio::test]
    async fn test_call_unknown_service() {
        let server = RegistryServer::new();
        let frame = create_call_request("forum", "list_forums", "").unwrap();

        let reply = decode(&server.process_frame(&frame).await).unwrap();
        assert_eq!(reply.service.trimmed(), "forum");
        assert_eq!(reply.status, Some(Status::Nk));
        assert_eq!(reply.data, "Service forum not found");
    }

    #[tokio::test]
    async fn test_malformed_frame_answered_under_server_context() {
        let server = RegistryServer::new();

        let reply = decode(&server.process_frame("00099calc add").await).unwrap();
        assert_eq!(reply.service.trimmed(), "srvr");
        assert_eq!(reply.status, Some(Status::Nk));
        assert!(reply.data.starts_with("Server error: Malformed frame"));
    }

    #[tokio::test]
    async fn test_bad_registration_answered_under_server_context() {
        let server = RegistryServer::new();
        let frame = crate::protocol::encode("rgstr", "localhost", None).unwrap();

        let reply = decode(&server.process_frame(&frame).await).unwrap();
        assert_eq!(reply.service.trimmed(), "srvr");
        assert_eq!(reply.status, Some(Status::Nk));
        assert!(server.directory().is_empty());
    }

    #[tokio::test]
    async fn test_reserved_name_registration_refused() {
        let server = RegistryServer::new();
        for name in ["rgstr", "unrgs"] {
            let frame = create_registration(name, "127.0.0.1", 9, "x").unwrap();
            let reply = decode(&server.process_frame(&frame).await).unwrap();
            assert_eq!(reply.service.trimmed(), "srvr");
            assert_eq!(reply.status, Some(Status::Nk));
            assert_eq!(
                reply.data,
                "Server error: Invalid control message: reserved service name"
            );
        }
        assert!(server.directory().is_empty());
    }

    #[tokio::test]
    async fn test_call_without_method_rejected_before_lookup() {
        let server = RegistryServer::new();
        let frame = create_call_request("calc", "", "").unwrap();

        let reply = decode(&server.process_frame(&frame).await).unwrap();
        assert_eq!(reply.status, Some(Status::Nk));
        assert_eq!(reply.data, "Missing required fields: service_name, method");
    }

    #[tokio::test]
    async fn test_port_zero_registration_refused() {
        let server = RegistryServer::new();
        let frame = create_registration("calc", "127.0.0.1", 0, "").unwrap();

        let reply = decode(&server.process_frame(&frame).await).unwrap();
        assert_eq!(reply.service.trimmed(), "srvr");
        assert_eq!(reply.status, Some(Status::Nk));
        assert!(server.directory().is_empty());
    }

    #[tokio::test]
    async fn test_stale_entry_is_downstream_error() {
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap().port()
        };
        let server = RegistryServer::new();
        server
            .process_frame(&create_registration("gone", "127.0.0.1", port, "").unwrap())
            .await;

        let reply = decode(
            &server
                .process_frame(&create_call_request("gone", "ping", "").unwrap())
                .await,
        )
        .unwrap();
        assert_eq!(reply.service.trimmed(), "gone");
        assert_eq!(reply.status, Some(Status::Nk));
        assert!(reply.data.starts_with("Service call error"));
        assert!(!reply.data.contains("not found"));
    }

    #[tokio::test]
    async fn test_start_and_shutdown() {
        let mut handle = RegistryServer::new().start("127.0.0.1", 0).await.unwrap();
        assert!(handle.port() > 0);
        handle.shutdown();
        handle.wait().await;
    }

    #[tokio::test]
    async fn test_garbage_over_socket_gets_nk() {
        let handle = RegistryServer::new().start("127.0.0.1", 0).await.unwrap();

        let reply = exchange(
            "127.0.0.1",
            handle.port(),
            "hello there",
            TimeoutConfig::default(),
        )
        .await
        .unwrap();
        let reply = decode(&reply).unwrap();
        assert_eq!(reply.service.trimmed(), "srvr");
        assert_eq!(reply.status, Some(Status::Nk));
    }
}
