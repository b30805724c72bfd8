//! End-to-end tests: a real registry, real services and a client, all on
//! loopback with OS-assigned ports.

use soa_core::service::{ArgumentError, CallArgs, HandlerError};
use soa_core::{
    CallResponse, RegistryAddress, RegistryHandle, RegistryServer, ServiceBuilder, ServiceName,
    SoaClient, TimeoutConfig,
};
use std::time::Duration;

/// Start a registry on a free port and a client pointed at it.
async fn start_registry() -> (RegistryHandle, SoaClient) {
    let registry = RegistryServer::new()
        .with_timeouts(TimeoutConfig::uniform(Duration::from_secs(5)))
        .start("127.0.0.1", 0)
        .await
        .expect("registry should bind");
    let client = SoaClient::new(RegistryAddress::new("127.0.0.1", registry.port()));
    (registry, client)
}

fn service(name: &str, registry: &RegistryHandle) -> ServiceBuilder {
    ServiceBuilder::new(name)
        .host("127.0.0.1")
        .registry(RegistryAddress::new("127.0.0.1", registry.port()))
}

#[tokio::test]
async fn test_echo_through_registry() {
    let (registry, client) = start_registry().await;
    let echo = service("ECHO_", &registry)
        .method("echo", |args: CallArgs| Ok::<_, ArgumentError>(args.one()?))
        .start()
        .await
        .unwrap();
    assert!(echo.is_registered());

    let response = client.call("ECHO_", "echo", "42").await.unwrap();
    assert_eq!(response, CallResponse::success("42"));

    let json = serde_json::to_value(&response).unwrap();
    assert_eq!(json, serde_json::json!({"status": "success", "result": "42"}));

    echo.shutdown().await;
}

#[tokio::test]
async fn test_variadic_call_through_registry() {
    let (registry, client) = start_registry().await;
    let stats = service("stats", &registry)
        .method("sum", |args: CallArgs| {
            args.into_values()
                .iter()
                .try_fold(0.0, |acc, v| Ok::<_, ArgumentError>(acc + v.number()?))
        })
        .start()
        .await
        .unwrap();

    let response = client.call("stats", "sum", "1 2.5 3").await.unwrap();
    assert_eq!(response, CallResponse::success("6.5"));

    let response = client.call("stats", "sum", "1 two 3").await.unwrap();
    assert_eq!(
        response,
        CallResponse::error("Error executing method 'sum': 'two' is not a number")
    );

    stats.shutdown().await;
}

#[tokio::test]
async fn test_unknown_service_not_found() {
    let (_registry, client) = start_registry().await;

    let response = client.call("forum", "list_forums", "").await.unwrap();
    assert_eq!(response, CallResponse::error("Service forum not found"));
}

#[tokio::test]
async fn test_unknown_method_lists_known_methods() {
    let (registry, client) = start_registry().await;
    let calc = service("calc", &registry)
        .method("add", |_: CallArgs| Ok::<_, HandlerError>(0))
        .method("subtract", |_: CallArgs| Ok::<_, HandlerError>(0))
        .start()
        .await
        .unwrap();

    let response = client.call("calc", "modulo", "1 2").await.unwrap();
    assert!(!response.is_success());
    assert!(response.text().contains("add"));
    assert!(response.text().contains("subtract"));

    calc.shutdown().await;
}

#[tokio::test]
async fn test_shutdown_unregisters() {
    let (registry, client) = start_registry().await;
    let svc = service("temp", &registry)
        .method("ping", |_: CallArgs| Ok::<_, HandlerError>("pong"))
        .start()
        .await
        .unwrap();
    assert_eq!(registry.directory().len(), 1);

    svc.shutdown().await;
    assert!(registry.directory().is_empty());

    let response = client.call("temp", "ping", "").await.unwrap();
    assert!(response.text().contains("not found"));
}

#[tokio::test]
async fn test_reregistration_last_write_wins() {
    let (registry, client) = start_registry().await;

    let first = service("dup", &registry)
        .method("who", |_: CallArgs| Ok::<_, HandlerError>("first"))
        .start()
        .await
        .unwrap();
    let second = service("dup", &registry)
        .method("who", |_: CallArgs| Ok::<_, HandlerError>("second"))
        .start()
        .await
        .unwrap();

    assert_eq!(registry.directory().len(), 1);
    let entry = registry
        .directory()
        .lookup(&ServiceName::new("dup"))
        .unwrap()
        .unwrap();
    assert_eq!(entry.port, second.port());

    let response = client.call("dup", "who", "").await.unwrap();
    assert_eq!(response, CallResponse::success("second"));

    drop(first);
    second.shutdown().await;
}

#[tokio::test]
async fn test_crashed_service_leaves_stale_entry() {
    let (registry, client) = start_registry().await;
    let svc = service("flaky", &registry)
        .method("ping", |_: CallArgs| Ok::<_, HandlerError>("pong"))
        .start()
        .await
        .unwrap();

    // Dropping the handle stops the listener without unregistering
    drop(svc);
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(registry.directory().len(), 1);
    let response = client.call("flaky", "ping", "").await.unwrap();
    assert!(!response.is_success());
    assert!(response.text().starts_with("Service call error"));
    assert!(!response.text().contains("not found"));
}

#[tokio::test]
async fn test_long_names_share_a_routing_key() {
    let (registry, client) = start_registry().await;
    let svc = service("notifications", &registry)
        .method("count", |_: CallArgs| Ok::<_, HandlerError>(3))
        .start()
        .await
        .unwrap();

    let response = client.call("notif", "count", "").await.unwrap();
    assert_eq!(response, CallResponse::success("3"));

    svc.shutdown().await;
}

#[tokio::test]
async fn test_handler_error_relayed() {
    let (registry, client) = start_registry().await;
    let svc = service("calc", &registry)
        .method("divide", |args: CallArgs| -> Result<f64, HandlerError> {
            let (a, b) = args.two()?;
            let b = b.number()?;
            if b == 0.0 {
                return Err("Cannot divide by zero".into());
            }
            Ok(a.number()? / b)
        })
        .start()
        .await
        .unwrap();

    let response = client.call("calc", "divide", "1 0").await.unwrap();
    assert_eq!(
        response,
        CallResponse::error("Error executing method 'divide': Cannot divide by zero")
    );

    svc.shutdown().await;
}

#[tokio::test]
async fn test_garbage_frame_answered_under_server_context() {
    let (_registry, client) = start_registry().await;

    let reply = client.send("definitely not a frame").await.unwrap();
    let frame = soa_core::protocol::decode(&reply).unwrap();
    assert_eq!(frame.service.trimmed(), "srvr");
    assert_eq!(frame.status, Some(soa_core::Status::Nk));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_calls() {
    let (registry, client) = start_registry().await;
    let svc = service("slow", &registry)
        .method("id", |args: CallArgs| {
            std::thread::sleep(Duration::from_millis(20));
            Ok::<_, ArgumentError>(args.one()?)
        })
        .start()
        .await
        .unwrap();

    let calls: Vec<_> = (0..8)
        .map(|i| {
            let client = client.clone();
            tokio::spawn(async move { client.call("slow", "id", &i.to_string()).await })
        })
        .collect();
    for (i, call) in calls.into_iter().enumerate() {
        let response = call.await.unwrap().unwrap();
        assert_eq!(response, CallResponse::success(i.to_string()));
    }

    svc.shutdown().await;
}
