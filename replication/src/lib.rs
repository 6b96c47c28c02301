mod channel;
mod coordinator;

pub use channel::{ReplicationMessage, MessageKind, ReplicationReceiver, send_message};
pub use coordinator::LeaderFollowerCoordinator;

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use uuid::Uuid;

/// Self-description of a component instance. Immutable after construction;
/// used in protocol responses and for replication addressing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentIdentity {
    pub component_type: String,
    pub instance_id: String,
    pub host: String,
    pub http_port: u16,
    pub tcp_port: u16,
    pub udp_port: u16,
}

impl ComponentIdentity {
    pub fn new(
        component_type: impl Into<String>,
        host: impl Into<String>,
        http_port: u16,
        tcp_port: u16,
        udp_port: u16,
    ) -> Self {
        Self {
            component_type: component_type.into(),
            instance_id: Uuid::new_v4().to_string(),
            host: host.into(),
            http_port,
            tcp_port,
            udp_port,
        }
    }
}

/// Fixed at startup; there is no election and no renegotiation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    Leader,
    Follower,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Leader => "LEADER",
            Role::Follower => "FOLLOWER",
        }
    }
}

/// On a leader this names the instance itself; on a follower, the peer it
/// replicates from. `port` is the replication control port, not a client port.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaderReference {
    pub leader_id: Option<String>,
    pub host: String,
    pub port: u16,
}

/// Capability contract a concrete component implements so the coordinator can
/// drive it. Invoked by composition; the coordinator never owns the state.
pub trait StateComponent: Send + Sync {
    fn on_become_leader(&self);
    fn on_become_follower(&self);
    /// Full-state encode. The payload format is owned by the component.
    fn serialize_state(&self) -> String;
    /// Full-state restore. A failed decode must leave prior state untouched.
    fn process_state_update(&self, payload: &str) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Control port this instance uses for replication traffic.
    pub replication_port: u16,
    /// Replication targets when running as leader (host:replication_port).
    pub followers: Vec<SocketAddr>,
    pub period_ms: u64,
    pub initial_delay_ms: u64,
    pub push_timeout_ms: u64,
}

impl Config {
    pub fn new(replication_port: u16) -> Self {
        Self {
            replication_port,
            followers: Vec::new(),
            period_ms: 5000,
            initial_delay_ms: 1000,
            push_timeout_ms: 2000,
        }
    }
}

pub type Result<T> = std::result::Result<T, ReplicationError>;

#[derive(Debug, thiserror::Error)]
pub enum ReplicationError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error("Failed to bind replication port {port}: {source}")]
    Bind {
        port: u16,
        source: std::io::Error,
    },

    #[error("Operation requires the leader role")]
    NotLeader,

    #[error("Timed out pushing to follower {0}")]
    PushTimeout(SocketAddr),

    #[error("Protocol error: {0}")]
    Protocol(String),
}
