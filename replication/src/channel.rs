use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{watch, RwLock};

use crate::{LeaderReference, ReplicationError, Result, StateComponent};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageKind {
    StateSnapshot,
    LeaderAnnouncement,
}

/// One leader-to-follower message. The payload is opaque to the channel: a
/// serialized state for snapshots, `id|host|port` for announcements.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplicationMessage {
    pub kind: MessageKind,
    pub payload: String,
}

impl ReplicationMessage {
    pub fn snapshot(payload: String) -> Self {
        Self {
            kind: MessageKind::StateSnapshot,
            payload,
        }
    }

    pub fn announcement(leader: &LeaderReference) -> Self {
        let id = leader.leader_id.as_deref().unwrap_or("");
        Self {
            kind: MessageKind::LeaderAnnouncement,
            payload: format!("{}|{}|{}", id, leader.host, leader.port),
        }
    }
}

/// Writes one message to a follower's replication port. The whole exchange is
/// bounded by `timeout` so an unreachable follower cannot stall the caller.
pub async fn send_message(
    addr: SocketAddr,
    message: &ReplicationMessage,
    timeout: Duration,
) -> Result<()> {
    let push = async {
        let mut stream = TcpStream::connect(addr).await?;
        let mut line = serde_json::to_string(message)?;
        line.push('\n');
        stream.write_all(line.as_bytes()).await?;
        Ok::<(), ReplicationError>(())
    };

    tokio::time::timeout(timeout, push)
        .await
        .map_err(|_| ReplicationError::PushTimeout(addr))?
}

/// Receiving side of the channel: accepts connections from the leader and
/// dispatches one decoded message per line. Decode failures are logged and
/// skipped; the loop only exits on shutdown.
pub struct ReplicationReceiver {
    listener: TcpListener,
}

impl ReplicationReceiver {
    pub async fn bind(host: &str, port: u16) -> Result<Self> {
        let listener = TcpListener::bind((host, port))
            .await
            .map_err(|source| ReplicationError::Bind { port, source })?;
        Ok(Self { listener })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub async fn run(
        self,
        component: Arc<dyn StateComponent>,
        leader: Arc<RwLock<Option<LeaderReference>>>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                accepted = self.listener.accept() => {
                    match accepted {
                        Ok((stream, peer)) => {
                            let component = component.clone();
                            let leader = leader.clone();
                            tokio::spawn(async move {
                                Self::serve_connection(stream, component, leader).await;
                                tracing::debug!("Replication connection from {} closed", peer);
                            });
                        }
                        Err(e) => tracing::warn!("Replication accept failed: {}", e),
                    }
                }
            }
        }

        tracing::debug!("Replication receiver stopped");
    }

    async fn serve_connection(
        stream: TcpStream,
        component: Arc<dyn StateComponent>,
        leader: Arc<RwLock<Option<LeaderReference>>>,
    ) {
        let mut lines = BufReader::new(stream).lines();

        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    Self::dispatch_line(&line, &component, &leader).await;
                }
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!("Replication read failed: {}", e);
                    break;
                }
            }
        }
    }

    async fn dispatch_line(
        line: &str,
        component: &Arc<dyn StateComponent>,
        leader: &Arc<RwLock<Option<LeaderReference>>>,
    ) {
        let message: ReplicationMessage = match serde_json::from_str(line) {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!("Discarding undecodable replication message: {}", e);
                return;
            }
        };

        match message.kind {
            MessageKind::StateSnapshot => {
                if let Err(e) = component.process_state_update(&message.payload) {
                    tracing::warn!("Discarding malformed state snapshot: {}", e);
                }
            }
            MessageKind::LeaderAnnouncement => {
                match parse_announcement(&message.payload) {
                    Ok(reference) => {
                        tracing::info!(
                            "Leader announced: {} at {}:{}",
                            reference.leader_id.as_deref().unwrap_or("?"),
                            reference.host,
                            reference.port
                        );
                        *leader.write().await = Some(reference);
                    }
                    Err(e) => tracing::warn!("Discarding malformed announcement: {}", e),
                }
            }
        }
    }
}

fn parse_announcement(payload: &str) -> Result<LeaderReference> {
    let mut parts = payload.split('|');
    let id = parts
        .next()
        .ok_or_else(|| ReplicationError::Protocol("announcement missing id".to_string()))?;
    let host = parts
        .next()
        .ok_or_else(|| ReplicationError::Protocol("announcement missing host".to_string()))?;
    let port = parts
        .next()
        .ok_or_else(|| ReplicationError::Protocol("announcement missing port".to_string()))?
        .parse::<u16>()
        .map_err(|e| ReplicationError::Protocol(format!("announcement bad port: {}", e)))?;

    Ok(LeaderReference {
        leader_id: if id.is_empty() { None } else { Some(id.to_string()) },
        host: host.to_string(),
        port,
    })
}
