//! Helpers for wiring real component instances on loopback sockets.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpStream, UdpSocket};

use component::{ComponentKind, EventComponent};
use replication::{
    ComponentIdentity, Config as ReplicationConfig, LeaderFollowerCoordinator, LeaderReference,
};
use runtime::{BoundPorts, ComponentRuntime, Config as RuntimeConfig};

pub struct TestComponent {
    pub component: Arc<EventComponent>,
    pub coordinator: Arc<LeaderFollowerCoordinator>,
    pub runtime: Arc<ComponentRuntime>,
    pub bound: BoundPorts,
}

impl TestComponent {
    pub fn stop(&self) {
        self.runtime.stop();
        self.coordinator.stop();
    }
}

/// Picks a currently-free TCP port. The listener is dropped before the port
/// is handed out, so the caller must bind it promptly.
pub fn free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0")
        .expect("failed to probe for a free port");
    listener
        .local_addr()
        .expect("probe listener has no local addr")
        .port()
}

/// Starts a leader on ephemeral ports. `start_coordinator: false` leaves the
/// role callbacks and the replication timer off, for tests that need an
/// empty log.
pub async fn leader_node(
    followers: Vec<SocketAddr>,
    period_ms: u64,
    start_coordinator: bool,
) -> TestComponent {
    let mut replication_config = ReplicationConfig::new(0);
    replication_config.followers = followers;
    replication_config.period_ms = period_ms;
    replication_config.initial_delay_ms = 50;

    let identity = ComponentIdentity::new("componentB", "127.0.0.1", 0, 0, 0);
    let coordinator = Arc::new(LeaderFollowerCoordinator::new(replication_config));
    coordinator.configure_as_leader(&identity).await.unwrap();

    build_node(ComponentKind::B, identity, coordinator, start_coordinator).await
}

/// Starts a follower whose replication receiver listens on
/// `replication_port`, replicating from the leader at `leader_port`.
pub async fn follower_node(
    replication_port: u16,
    leader_id: &str,
    leader_port: u16,
) -> TestComponent {
    let replication_config = ReplicationConfig::new(replication_port);

    let identity = ComponentIdentity::new("componentB", "127.0.0.1", 0, 0, 0);
    let coordinator = Arc::new(LeaderFollowerCoordinator::new(replication_config));
    coordinator
        .configure_as_follower(
            &identity,
            LeaderReference {
                leader_id: Some(leader_id.to_string()),
                host: "127.0.0.1".to_string(),
                port: leader_port,
            },
        )
        .await
        .unwrap();

    build_node(ComponentKind::B, identity, coordinator, true).await
}

async fn build_node(
    kind: ComponentKind,
    identity: ComponentIdentity,
    coordinator: Arc<LeaderFollowerCoordinator>,
    start_coordinator: bool,
) -> TestComponent {
    let component = Arc::new(EventComponent::new(kind, identity, coordinator.clone()));
    coordinator.attach_component(component.clone()).unwrap();

    let runtime = Arc::new(ComponentRuntime::new(
        RuntimeConfig {
            host: "127.0.0.1".to_string(),
            http_port: 0,
            tcp_port: 0,
            udp_port: 0,
        },
        component.clone(),
    ));
    let bound = runtime.start().await.unwrap();

    if start_coordinator {
        coordinator.on_start().await.unwrap();
    }

    TestComponent {
        component,
        coordinator,
        runtime,
        bound,
    }
}

/// One `ACTION|DATA` exchange over the component's TCP port.
pub async fn tcp_request(addr: SocketAddr, line: &str) -> String {
    let (read_half, mut write_half) = TcpStream::connect(addr)
        .await
        .expect("TCP connect failed")
        .into_split();

    write_half
        .write_all(format!("{}\n", line).as_bytes())
        .await
        .expect("TCP write failed");

    let mut response = String::new();
    BufReader::new(read_half)
        .read_line(&mut response)
        .await
        .expect("TCP read failed");
    response.trim_end().to_string()
}

/// Sends raw HTTP bytes and returns the full response.
pub async fn http_request(addr: SocketAddr, raw: &str) -> String {
    let mut stream = TcpStream::connect(addr).await.expect("HTTP connect failed");
    stream
        .write_all(raw.as_bytes())
        .await
        .expect("HTTP write failed");

    let mut response = Vec::new();
    stream
        .read_to_end(&mut response)
        .await
        .expect("HTTP read failed");
    String::from_utf8_lossy(&response).into_owned()
}

/// One request/response datagram exchange.
pub async fn udp_request(addr: SocketAddr, message: &str) -> String {
    let socket = UdpSocket::bind("127.0.0.1:0")
        .await
        .expect("UDP bind failed");
    socket
        .send_to(message.as_bytes(), addr)
        .await
        .expect("UDP send failed");

    let mut buf = vec![0u8; 64 * 1024];
    let (len, _) = socket.recv_from(&mut buf).await.expect("UDP receive failed");
    String::from_utf8_lossy(&buf[..len]).into_owned()
}
