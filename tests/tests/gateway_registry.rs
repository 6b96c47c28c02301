//! Gateway registration contract against a live RegistryServer.

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::watch;

use registry::{Config as RegistryConfig, RegistryClient, RegistryServer};
use replication::ComponentIdentity;

async fn raw_line(addr: std::net::SocketAddr, line: &str) -> String {
    let (read_half, mut write_half) = TcpStream::connect(addr).await.unwrap().into_split();
    write_half
        .write_all(format!("{}\n", line).as_bytes())
        .await
        .unwrap();

    let mut response = String::new();
    BufReader::new(read_half)
        .read_line(&mut response)
        .await
        .unwrap();
    response.trim_end().to_string()
}

#[tokio::test]
async fn component_registers_and_is_found_by_lookup() {
    let server = RegistryServer::new();
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);
    let addr = server.run("127.0.0.1", 0, shutdown_rx).await.unwrap();

    let identity = ComponentIdentity::new("componentB", "localhost", 8281, 8282, 8283);
    let client = RegistryClient::new(
        RegistryConfig::new("127.0.0.1", addr.port()),
        identity.clone(),
    );

    let ack = client.register().await.unwrap();
    assert_eq!(
        ack,
        format!("OK|Componente registrado: {}", identity.instance_id)
    );
    assert_eq!(server.registered_count("componentB").await, 1);

    let found = raw_line(addr, "LOOKUP|componentB").await;
    assert_eq!(
        found,
        format!("FOUND|{}|localhost|8281|8282|8283", identity.instance_id)
    );
}

#[tokio::test]
async fn heartbeat_refreshes_a_registered_instance() {
    let server = RegistryServer::new();
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);
    let addr = server.run("127.0.0.1", 0, shutdown_rx).await.unwrap();

    let identity = ComponentIdentity::new("componentA", "localhost", 8181, 8182, 8183);
    let client = RegistryClient::new(
        RegistryConfig::new("127.0.0.1", addr.port()),
        identity.clone(),
    );
    client.register().await.unwrap();

    let response = raw_line(
        addr,
        &format!("HEARTBEAT|componentA|{}", identity.instance_id),
    )
    .await;
    assert_eq!(response, "OK");
}

#[tokio::test]
async fn registration_failure_is_not_fatal() {
    // No gateway at this address; registration must just error out, leaving
    // the caller free to continue starting up.
    let identity = ComponentIdentity::new("componentB", "localhost", 8281, 8282, 8283);
    let client = RegistryClient::new(RegistryConfig::new("127.0.0.1", 1), identity);

    assert!(client.register().await.is_err());
}

#[tokio::test]
async fn unknown_gateway_action_is_an_error() {
    let server = RegistryServer::new();
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);
    let addr = server.run("127.0.0.1", 0, shutdown_rx).await.unwrap();

    let response = raw_line(addr, "ROUTE|componentB").await;
    assert_eq!(response, "ERROR|Ação desconhecida: ROUTE");
}
