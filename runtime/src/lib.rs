mod http;
mod server;

pub use http::{HttpRequest, HttpResponse};
pub use server::{BoundPorts, ComponentRuntime};

use async_trait::async_trait;

/// Per-protocol dispatch contract. The runtime only performs connection and
/// datagram plumbing; every request semantics decision lives behind this
/// trait in the concrete component.
#[async_trait]
pub trait ProtocolHandler: Send + Sync {
    async fn handle_http(&self, request: HttpRequest) -> HttpResponse;

    /// One request line in, one response line out (`ACTION|DATA` framing).
    async fn handle_tcp(&self, line: &str) -> String;

    /// One datagram in, one response datagram out.
    async fn handle_udp(&self, datagram: &str) -> String;
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub http_port: u16,
    pub tcp_port: u16,
    pub udp_port: u16,
}

pub type Result<T> = std::result::Result<T, ServerError>;

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to bind {protocol} port {port}: {source}")]
    Bind {
        protocol: &'static str,
        port: u16,
        source: std::io::Error,
    },

    #[error("Runtime already started")]
    AlreadyStarted,

    #[error("Protocol error: {0}")]
    Protocol(String),
}
