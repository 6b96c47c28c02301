use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{watch, RwLock};

use crate::{Result, RegistryError};

#[derive(Debug, Clone)]
pub struct Registration {
    pub component_type: String,
    pub instance_id: String,
    pub host: String,
    pub http_port: u16,
    pub tcp_port: u16,
    pub udp_port: u16,
    pub last_seen: DateTime<Utc>,
}

/// Gateway-side registration acceptor. Tracks registered instances per
/// component type and answers lookups; routing is not its job.
///
/// Line protocol, one request per connection:
///   `REGISTER|type|id|host|http|tcp|udp` -> `OK|Componente registrado: id`
///   `HEARTBEAT|type|id`                  -> `OK` (or `ERROR|...` if unknown)
///   `LOOKUP|type`                        -> `FOUND|id|host|http|tcp|udp` or `NOT_FOUND`
pub struct RegistryServer {
    registrations: Arc<RwLock<HashMap<String, Vec<Registration>>>>,
}

impl RegistryServer {
    pub fn new() -> Self {
        Self {
            registrations: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn run(
        &self,
        host: &str,
        port: u16,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<SocketAddr> {
        let listener = TcpListener::bind((host, port)).await?;
        let local_addr = listener.local_addr()?;
        tracing::info!("Registry server listening on {}", local_addr);

        let registrations = self.registrations.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown.changed() => break,
                    accepted = listener.accept() => match accepted {
                        Ok((stream, peer)) => {
                            let registrations = registrations.clone();
                            tokio::spawn(async move {
                                if let Err(e) = Self::serve_connection(stream, registrations).await {
                                    tracing::debug!("Registry connection from {} failed: {}", peer, e);
                                }
                            });
                        }
                        Err(e) => tracing::warn!("Registry accept failed: {}", e),
                    }
                }
            }

            tracing::debug!("Registry server stopped");
        });

        Ok(local_addr)
    }

    pub async fn registered_count(&self, component_type: &str) -> usize {
        self.registrations
            .read()
            .await
            .get(component_type)
            .map(Vec::len)
            .unwrap_or(0)
    }

    async fn serve_connection(
        stream: TcpStream,
        registrations: Arc<RwLock<HashMap<String, Vec<Registration>>>>,
    ) -> Result<()> {
        let (read_half, mut write_half) = stream.into_split();
        let mut line = String::new();
        BufReader::new(read_half).read_line(&mut line).await?;

        let line = line.trim_end();
        if line.is_empty() {
            return Ok(());
        }

        let mut response = Self::dispatch(line, &registrations).await;
        response.push('\n');
        write_half.write_all(response.as_bytes()).await?;
        Ok(())
    }

    async fn dispatch(
        line: &str,
        registrations: &Arc<RwLock<HashMap<String, Vec<Registration>>>>,
    ) -> String {
        let mut parts = line.split('|');
        let action = parts.next().unwrap_or("").to_uppercase();
        let fields: Vec<&str> = parts.collect();

        match action.as_str() {
            "REGISTER" => match Self::parse_registration(&fields) {
                Ok(registration) => {
                    let instance_id = registration.instance_id.clone();
                    let mut guard = registrations.write().await;
                    let entries = guard
                        .entry(registration.component_type.clone())
                        .or_default();
                    entries.retain(|r| r.instance_id != instance_id);
                    entries.push(registration);

                    tracing::info!("Registered component instance {}", instance_id);
                    format!("OK|Componente registrado: {}", instance_id)
                }
                Err(e) => format!("ERROR|{}", e),
            },
            "HEARTBEAT" => {
                let (component_type, instance_id) = match (fields.first(), fields.get(1)) {
                    (Some(t), Some(i)) => (*t, *i),
                    _ => return "ERROR|Formato HEARTBEAT inválido".to_string(),
                };

                let mut guard = registrations.write().await;
                let known = guard
                    .get_mut(component_type)
                    .and_then(|entries| {
                        entries.iter_mut().find(|r| r.instance_id == instance_id)
                    })
                    .map(|r| r.last_seen = Utc::now())
                    .is_some();

                if known {
                    "OK".to_string()
                } else {
                    format!("ERROR|Instância desconhecida: {}", instance_id)
                }
            }
            "LOOKUP" => {
                let component_type = match fields.first() {
                    Some(t) => *t,
                    None => return "ERROR|Formato LOOKUP inválido".to_string(),
                };

                let guard = registrations.read().await;
                match guard.get(component_type).and_then(|entries| entries.last()) {
                    Some(r) => format!(
                        "FOUND|{}|{}|{}|{}|{}",
                        r.instance_id, r.host, r.http_port, r.tcp_port, r.udp_port
                    ),
                    None => "NOT_FOUND".to_string(),
                }
            }
            _ => format!("ERROR|Ação desconhecida: {}", action),
        }
    }

    fn parse_registration(fields: &[&str]) -> Result<Registration> {
        if fields.len() < 6 {
            return Err(RegistryError::Protocol(
                "Formato REGISTER inválido".to_string(),
            ));
        }

        let parse_port = |value: &str| -> Result<u16> {
            value
                .parse::<u16>()
                .map_err(|_| RegistryError::Protocol(format!("Porta inválida: {}", value)))
        };

        Ok(Registration {
            component_type: fields[0].to_string(),
            instance_id: fields[1].to_string(),
            host: fields[2].to_string(),
            http_port: parse_port(fields[3])?,
            tcp_port: parse_port(fields[4])?,
            udp_port: parse_port(fields[5])?,
            last_seen: Utc::now(),
        })
    }
}

impl Default for RegistryServer {
    fn default() -> Self {
        Self::new()
    }
}
