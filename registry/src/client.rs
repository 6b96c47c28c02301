use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::watch;

use replication::ComponentIdentity;

use crate::{Config, RegistryError, Result};

/// Registers a component instance with the gateway and keeps it fresh with
/// periodic heartbeats. Both operations are fire-and-forget from the
/// component's point of view: a dead gateway is logged, never fatal, and must
/// never keep the component's own listeners from starting.
pub struct RegistryClient {
    config: Config,
    identity: ComponentIdentity,
}

impl RegistryClient {
    pub fn new(config: Config, identity: ComponentIdentity) -> Self {
        Self { config, identity }
    }

    pub async fn register(&self) -> Result<String> {
        let line = format!(
            "REGISTER|{}|{}|{}|{}|{}|{}",
            self.identity.component_type,
            self.identity.instance_id,
            self.identity.host,
            self.identity.http_port,
            self.identity.tcp_port,
            self.identity.udp_port
        );

        let ack = self.exchange(&line).await?;
        tracing::info!(
            "Registered {} with gateway at {}:{}",
            self.identity.instance_id,
            self.config.gateway_host,
            self.config.registration_port
        );
        Ok(ack)
    }

    /// Sends `HEARTBEAT` lines until shutdown. Failures are logged and the
    /// loop keeps going; the gateway reappearing is enough to recover.
    pub async fn run_heartbeat(&self, mut shutdown: watch::Receiver<bool>) {
        let mut interval =
            tokio::time::interval(Duration::from_millis(self.config.heartbeat_interval_ms));
        interval.tick().await;

        let line = format!(
            "HEARTBEAT|{}|{}",
            self.identity.component_type, self.identity.instance_id
        );

        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                _ = interval.tick() => {
                    if let Err(e) = self.exchange(&line).await {
                        tracing::warn!("Heartbeat to gateway failed: {}", e);
                    }
                }
            }
        }

        tracing::debug!("Heartbeat loop stopped");
    }

    async fn exchange(&self, line: &str) -> Result<String> {
        let timeout_ms = self.config.request_timeout_ms;
        let addr = (
            self.config.gateway_host.as_str(),
            self.config.registration_port,
        );

        let exchange = async {
            let stream = TcpStream::connect(addr).await?;
            let (read_half, mut write_half) = stream.into_split();

            write_half.write_all(line.as_bytes()).await?;
            write_half.write_all(b"\n").await?;

            let mut ack = String::new();
            BufReader::new(read_half).read_line(&mut ack).await?;
            Ok::<String, RegistryError>(ack.trim_end().to_string())
        };

        tokio::time::timeout(Duration::from_millis(timeout_ms), exchange)
            .await
            .map_err(|_| RegistryError::Timeout(timeout_ms))?
    }
}
