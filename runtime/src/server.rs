use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream, UdpSocket};
use tokio::sync::watch;

use crate::http::{read_request, HttpResponse};
use crate::{Config, ProtocolHandler, Result, ServerError};

const MAX_DATAGRAM_SIZE: usize = 64 * 1024;

/// Addresses the runtime actually bound. Ports configured as 0 resolve to an
/// ephemeral port here.
#[derive(Debug, Clone, Copy)]
pub struct BoundPorts {
    pub http: SocketAddr,
    pub tcp: SocketAddr,
    pub udp: SocketAddr,
}

/// Generic multi-protocol server shell: one accept loop each for HTTP and
/// line-based TCP spawning a task per connection, plus one UDP receive loop.
/// The three protocols run on independent tasks so a slow client on one can
/// never block the others.
pub struct ComponentRuntime {
    config: Config,
    handler: Arc<dyn ProtocolHandler>,
    started: AtomicBool,
    shutdown_tx: watch::Sender<bool>,
}

impl ComponentRuntime {
    pub fn new(config: Config, handler: Arc<dyn ProtocolHandler>) -> Self {
        let (shutdown_tx, _) = watch::channel(false);

        Self {
            config,
            handler,
            started: AtomicBool::new(false),
            shutdown_tx,
        }
    }

    /// Binds all three listeners, then spawns their serve loops. All binds
    /// happen before any loop starts, so a port conflict aborts the whole
    /// startup with a `Bind` error.
    pub async fn start(&self) -> Result<BoundPorts> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(ServerError::AlreadyStarted);
        }

        match self.bind_and_spawn().await {
            Ok(bound) => Ok(bound),
            Err(e) => {
                // A failed bind must leave the runtime startable again.
                self.started.store(false, Ordering::SeqCst);
                Err(e)
            }
        }
    }

    async fn bind_and_spawn(&self) -> Result<BoundPorts> {
        let host = self.config.host.as_str();

        let http_listener = TcpListener::bind((host, self.config.http_port))
            .await
            .map_err(|source| ServerError::Bind {
                protocol: "HTTP",
                port: self.config.http_port,
                source,
            })?;
        let tcp_listener = TcpListener::bind((host, self.config.tcp_port))
            .await
            .map_err(|source| ServerError::Bind {
                protocol: "TCP",
                port: self.config.tcp_port,
                source,
            })?;
        let udp_socket = UdpSocket::bind((host, self.config.udp_port))
            .await
            .map_err(|source| ServerError::Bind {
                protocol: "UDP",
                port: self.config.udp_port,
                source,
            })?;

        let bound = BoundPorts {
            http: http_listener.local_addr()?,
            tcp: tcp_listener.local_addr()?,
            udp: udp_socket.local_addr()?,
        };

        tracing::info!(
            "Component runtime listening on HTTP {}, TCP {}, UDP {}",
            bound.http,
            bound.tcp,
            bound.udp
        );

        {
            let handler = self.handler.clone();
            let shutdown = self.shutdown_tx.subscribe();
            tokio::spawn(async move {
                Self::http_accept_loop(http_listener, handler, shutdown).await;
            });
        }
        {
            let handler = self.handler.clone();
            let shutdown = self.shutdown_tx.subscribe();
            tokio::spawn(async move {
                Self::tcp_accept_loop(tcp_listener, handler, shutdown).await;
            });
        }
        {
            let handler = self.handler.clone();
            let shutdown = self.shutdown_tx.subscribe();
            tokio::spawn(async move {
                Self::udp_receive_loop(udp_socket, handler, shutdown).await;
            });
        }

        Ok(bound)
    }

    /// Signals every serve loop to exit. Safe to call from any task and safe
    /// to call twice; in-flight connection handlers run to completion.
    pub fn stop(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    async fn http_accept_loop(
        listener: TcpListener,
        handler: Arc<dyn ProtocolHandler>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        let handler = handler.clone();
                        tokio::spawn(async move {
                            if let Err(e) = Self::serve_http_connection(stream, handler).await {
                                tracing::debug!("HTTP connection from {} failed: {}", peer, e);
                            }
                        });
                    }
                    Err(e) => tracing::warn!("HTTP accept failed: {}", e),
                }
            }
        }

        tracing::debug!("HTTP listener stopped");
    }

    async fn serve_http_connection(
        stream: TcpStream,
        handler: Arc<dyn ProtocolHandler>,
    ) -> Result<()> {
        let (read_half, mut write_half) = stream.into_split();
        let mut reader = BufReader::new(read_half);

        let response = match read_request(&mut reader).await {
            Ok(request) => handler.handle_http(request).await,
            Err(ServerError::Protocol(reason)) => {
                tracing::debug!("Malformed HTTP request: {}", reason);
                HttpResponse::bad_request("Requisição inválida")
            }
            Err(e) => return Err(e),
        };

        write_half.write_all(response.encode().as_bytes()).await?;
        Ok(())
    }

    async fn tcp_accept_loop(
        listener: TcpListener,
        handler: Arc<dyn ProtocolHandler>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        let handler = handler.clone();
                        tokio::spawn(async move {
                            if let Err(e) = Self::serve_tcp_connection(stream, handler).await {
                                tracing::debug!("TCP connection from {} failed: {}", peer, e);
                            }
                        });
                    }
                    Err(e) => tracing::warn!("TCP accept failed: {}", e),
                }
            }
        }

        tracing::debug!("TCP listener stopped");
    }

    async fn serve_tcp_connection(
        stream: TcpStream,
        handler: Arc<dyn ProtocolHandler>,
    ) -> Result<()> {
        let (read_half, mut write_half) = stream.into_split();
        let mut line = String::new();
        BufReader::new(read_half).read_line(&mut line).await?;

        let line = line.trim_end_matches(['\r', '\n']);
        if line.is_empty() {
            return Ok(());
        }

        let mut response = handler.handle_tcp(line).await;
        response.push('\n');
        write_half.write_all(response.as_bytes()).await?;
        Ok(())
    }

    async fn udp_receive_loop(
        socket: UdpSocket,
        handler: Arc<dyn ProtocolHandler>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];

        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                received = socket.recv_from(&mut buf) => match received {
                    Ok((len, peer)) => {
                        let datagram = String::from_utf8_lossy(&buf[..len]).into_owned();
                        let response = handler
                            .handle_udp(datagram.trim_end_matches(['\r', '\n']))
                            .await;
                        if let Err(e) = socket.send_to(response.as_bytes(), peer).await {
                            tracing::warn!("UDP response to {} failed: {}", peer, e);
                        }
                    }
                    Err(e) => tracing::warn!("UDP receive failed: {}", e),
                }
            }
        }

        tracing::debug!("UDP listener stopped");
    }
}
