//! The listener every service process embeds.
//!
//! A [`ServiceBuilder`] collects the method table and settings; `start`
//! binds, registers with the registry (best-effort) and spawns the accept
//! loop. Each accepted connection carries one call frame and gets one
//! response frame back under the service's own name.

use super::dispatch::{CallArgs, DispatchStrategy};
use super::methods::{DynMethodHandler, HandlerError, MethodEntry, MethodTable};
use crate::client::SoaClient;
use crate::config::{RegistryAddress, TimeoutConfig};
use crate::platform::{BindPlan, RuntimeEnv};
use crate::protocol::{parse_request, CallResponse, Request, ServiceName};
use crate::transport::{read_message, write_message};
use crate::{Result, SoaError};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Display;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

/// Builder for a service runtime.
///
/// # Example
///
/// ```rust,no_run
/// use soa_core::service::{ArgumentError, CallArgs, ServiceBuilder};
///
/// # async fn run() -> soa_core::Result<()> {
/// let handle = ServiceBuilder::new("echo")
///     .description("Echo service")
///     .method("echo", |args: CallArgs| Ok::<_, ArgumentError>(args.one()?))
///     .start()
///     .await?;
/// handle.shutdown().await;
/// # Ok(())
/// # }
/// ```
pub struct ServiceBuilder {
    name: String,
    host: String,
    port: u16,
    description: String,
    version: String,
    registry: RegistryAddress,
    strategy: DispatchStrategy,
    methods: MethodTable,
    info_method: bool,
    container_aware: bool,
    register: bool,
    timeouts: TimeoutConfig,
}

impl ServiceBuilder {
    /// New builder. The registry address comes from `SOA_SERVER_HOST` /
    /// `SOA_SERVER_PORT` when set, `localhost:8000` otherwise.
    pub fn new(name: impl Into<String>) -> Self {
        let registry = RegistryAddress::from_env().unwrap_or_else(|e| {
            warn!("{}; using the default registry address", e);
            RegistryAddress::default()
        });
        Self {
            name: name.into(),
            host: "localhost".to_string(),
            port: 0,
            description: String::new(),
            version: "1.0.0".to_string(),
            registry,
            strategy: DispatchStrategy::default(),
            methods: MethodTable::new(),
            info_method: false,
            container_aware: false,
            register: true,
            timeouts: TimeoutConfig::default(),
        }
    }

    /// Host to bind and advertise.
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Port to bind; 0 lets the OS choose.
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn registry(mut self, registry: RegistryAddress) -> Self {
        self.registry = registry;
        self
    }

    /// Default strategy for methods that do not override it.
    pub fn strategy(mut self, strategy: DispatchStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Register a synchronous method.
    pub fn method<F, R, E>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(CallArgs) -> std::result::Result<R, E> + Send + Sync + 'static,
        R: Display,
        E: Into<HandlerError>,
    {
        self.methods.insert_fn(name, None, None, f);
        self
    }

    /// Register a synchronous method with a doc string for `info`.
    pub fn method_with_doc<F, R, E>(
        mut self,
        name: impl Into<String>,
        doc: impl Into<String>,
        f: F,
    ) -> Self
    where
        F: Fn(CallArgs) -> std::result::Result<R, E> + Send + Sync + 'static,
        R: Display,
        E: Into<HandlerError>,
    {
        self.methods.insert_fn(name, Some(doc.into()), None, f);
        self
    }

    /// Register a method that always receives the unsplit params string.
    pub fn raw_method<F, R, E>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(CallArgs) -> std::result::Result<R, E> + Send + Sync + 'static,
        R: Display,
        E: Into<HandlerError>,
    {
        self.methods
            .insert_fn(name, None, Some(DispatchStrategy::RawPassthrough), f);
        self
    }

    /// Register an async handler.
    pub fn handler(mut self, name: impl Into<String>, handler: DynMethodHandler) -> Self {
        self.methods.insert(
            name,
            MethodEntry {
                handler,
                doc: None,
                strategy: None,
            },
        );
        self
    }

    /// Install the standard `info` method.
    pub fn info_method(mut self) -> Self {
        self.info_method = true;
        self
    }

    /// Detect containers and bind the wildcard address while advertising
    /// the container hostname.
    pub fn container_aware(mut self, enabled: bool) -> Self {
        self.container_aware = enabled;
        self
    }

    /// Skip self-registration. Useful when the registry is not running.
    pub fn register_on_start(mut self, enabled: bool) -> Self {
        self.register = enabled;
        self
    }

    /// Limits for the registration and unregistration exchanges.
    pub fn timeouts(mut self, timeouts: TimeoutConfig) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Bind, register and start serving.
    ///
    /// A reserved routing key or a bind failure is an error. A failed
    /// registration is logged and the service keeps serving.
    pub async fn start(mut self) -> Result<ServiceHandle> {
        if ServiceName::new(&self.name).is_control() {
            return Err(SoaError::Config {
                message: format!("'{}' is a reserved routing key", self.name),
            });
        }

        let env = if self.container_aware {
            RuntimeEnv::detect()
        } else {
            RuntimeEnv::Host
        };
        let plan = BindPlan::for_env(env, &self.host);

        let listener = TcpListener::bind((plan.bind_host.as_str(), self.port)).await?;
        let addr = listener.local_addr()?;
        let port = addr.port();

        info!(
            "Service {} listening on {} (advertised as {}:{})",
            self.name, addr, plan.advertise_host, port
        );

        if self.info_method {
            self.install_info()?;
        }

        let runtime = Arc::new(ServiceRuntime {
            name: ServiceName::new(&self.name),
            methods: self.methods,
            strategy: self.strategy,
        });

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let task_handle = tokio::spawn(ServiceRuntime::accept_loop(
            listener,
            runtime.clone(),
            shutdown_rx,
        ));

        let registration = self.register.then(|| Registration {
            client: SoaClient::new(self.registry).with_timeouts(self.timeouts),
            name: self.name,
            host: plan.advertise_host,
            port,
            description: self.description,
        });
        let registered = match &registration {
            Some(registration) => registration.register().await,
            None => false,
        };

        Ok(ServiceHandle {
            addr,
            runtime,
            registration,
            registered,
            shutdown_tx: Some(shutdown_tx),
            task_handle: Some(task_handle),
        })
    }

    fn install_info(&mut self) -> Result<()> {
        let mut methods = self.methods.docs();
        methods.insert("info".to_string(), INFO_DOC.to_string());

        let info = ServiceInfo {
            service_name: &self.name,
            description: &self.description,
            version: &self.version,
            status: "running",
            methods,
        };
        let body = serde_json::to_string(&info)
            .map_err(|e| SoaError::Other(format!("Failed to serialize service info: {}", e)))?;

        self.methods.insert_fn(
            "info",
            Some(INFO_DOC.to_string()),
            Some(DispatchStrategy::AutoSplit),
            move |args: CallArgs| args.none().map(|_| body.clone()),
        );
        Ok(())
    }
}

const INFO_DOC: &str = "Return service metadata and available methods";

#[derive(Serialize)]
struct ServiceInfo<'a> {
    service_name: &'a str,
    description: &'a str,
    version: &'a str,
    status: &'a str,
    methods: BTreeMap<String, String>,
}

/// Registry bookkeeping for one service instance.
struct Registration {
    client: SoaClient,
    name: String,
    host: String,
    port: u16,
    description: String,
}

impl Registration {
    async fn register(&self) -> bool {
        let outcome = self
            .client
            .register(&self.name, &self.host, self.port, &self.description)
            .await;
        match self.check(outcome) {
            Ok(()) => {
                info!(
                    "Registered {} with registry {}",
                    self.name,
                    self.client.registry()
                );
                true
            }
            Err(e) => {
                warn!("{}; serving anyway", e);
                false
            }
        }
    }

    async fn unregister(&self) {
        let outcome = self.client.unregister(&self.name).await;
        match self.check(outcome) {
            Ok(()) => info!("Unregistered {}", self.name),
            Err(e) => warn!("Unregistering {} failed: {}", self.name, e),
        }
    }

    fn check(&self, outcome: Result<CallResponse>) -> Result<()> {
        let message = match outcome {
            Ok(CallResponse::Success { .. }) => return Ok(()),
            Ok(CallResponse::Error { message }) => message,
            Err(e) => e.to_string(),
        };
        Err(SoaError::RegistrationFailed {
            registry: self.client.registry().to_string(),
            message,
        })
    }
}

/// Handle to a running service.
///
/// Call [`shutdown`](Self::shutdown) to stop cleanly and unregister.
/// Dropping the handle stops the accept loop without unregistering.
pub struct ServiceHandle {
    addr: SocketAddr,
    runtime: Arc<ServiceRuntime>,
    registration: Option<Registration>,
    registered: bool,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task_handle: Option<tokio::task::JoinHandle<()>>,
}

impl ServiceHandle {
    /// Local address of the listener.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Bound port, useful when started on port 0.
    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// The five-character routing key.
    pub fn name(&self) -> &ServiceName {
        &self.runtime.name
    }

    /// Whether the startup registration was acknowledged.
    pub fn is_registered(&self) -> bool {
        self.registered
    }

    pub fn method_names(&self) -> Vec<String> {
        self.runtime.methods.names()
    }

    /// Stop accepting, unregister (best-effort) and close the listener.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.task_handle.take() {
            let _ = handle.await;
        }
        if let Some(registration) = &self.registration {
            registration.unregister().await;
        }
    }
}

impl Drop for ServiceHandle {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.task_handle.take() {
            handle.abort();
        }
    }
}

struct ServiceRuntime {
    name: ServiceName,
    methods: MethodTable,
    strategy: DispatchStrategy,
}

impl ServiceRuntime {
    async fn accept_loop(
        listener: TcpListener,
        runtime: Arc<Self>,
        mut shutdown_rx: oneshot::Receiver<()>,
    ) {
        loop {
            tokio::select! {
                _ = &mut shutdown_rx => {
                    info!("Service {} shutting down", runtime.name);
                    break;
                }
                accept_result = listener.accept() => {
                    match accept_result {
                        Ok((stream, peer_addr)) => {
                            let runtime = runtime.clone();
                            tokio::spawn(async move {
                                if let Err(e) = runtime.handle_connection(stream).await {
                                    debug!("Connection {} ended: {}", peer_addr, e);
                                }
                            });
                        }
                        Err(e) => {
                            error!("Service {} accept error: {}", runtime.name, e);
                        }
                    }
                }
            }
        }
    }

    async fn handle_connection(&self, mut stream: TcpStream) -> Result<()> {
        let outcome = match read_message(&mut stream).await {
            Ok(Some(raw)) => {
                debug!("Service {} received {}", self.name, raw);
                match parse_request(&raw) {
                    Ok(Request::Call { method, params, .. }) if !method.is_empty() => {
                        self.dispatch(&method, &params).await
                    }
                    Ok(_) => CallResponse::error("Missing method name"),
                    Err(e) => CallResponse::error(format!("Server error: {}", e)),
                }
            }
            Ok(None) => return Ok(()),
            Err(e) => CallResponse::error(format!("Server error: {}", e)),
        };

        let response = outcome.to_frame_lossy(self.name.trimmed());
        debug!("Service {} sending {}", self.name, response);
        write_message(&mut stream, &response).await
    }

    async fn dispatch(&self, method: &str, params: &str) -> CallResponse {
        let Some(entry) = self.methods.get(method) else {
            return CallResponse::error(
                SoaError::UnknownMethod {
                    method: method.to_string(),
                    available: self.methods.names(),
                }
                .to_string(),
            );
        };

        let args = entry.strategy.unwrap_or(self.strategy).args(params);
        let handler = entry.handler.clone();

        // Run in its own task so a panicking handler becomes an NK response
        let result = tokio::spawn(async move { handler.call(args).await }).await;
        let message = match result {
            Ok(Ok(output)) => return CallResponse::success(output),
            Ok(Err(e)) => e.to_string(),
            Err(e) => format!("handler panicked: {}", e),
        };

        let err = SoaError::Handler {
            method: method.to_string(),
            message,
        };
        warn!("Service {}: {}", self.name, err);
        CallResponse::error(err.to_string())
    }
}
