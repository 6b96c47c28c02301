mod client;
mod server;

pub use client::RegistryClient;
pub use server::RegistryServer;

#[derive(Debug, Clone)]
pub struct Config {
    pub gateway_host: String,
    pub registration_port: u16,
    pub heartbeat_interval_ms: u64,
    pub request_timeout_ms: u64,
}

impl Config {
    pub fn new(gateway_host: impl Into<String>, registration_port: u16) -> Self {
        Self {
            gateway_host: gateway_host.into(),
            registration_port,
            heartbeat_interval_ms: 10_000,
            request_timeout_ms: 2000,
        }
    }
}

pub type Result<T> = std::result::Result<T, RegistryError>;

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Gateway did not answer within {0}ms")]
    Timeout(u64),

    #[error("Protocol error: {0}")]
    Protocol(String),
}
