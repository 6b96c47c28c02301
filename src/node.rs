use std::sync::Arc;

use tokio::sync::watch;
use tracing::{info, warn};

use component::{ComponentKind, EventComponent};
use replication::{ComponentIdentity, LeaderFollowerCoordinator, LeaderReference};
use registry::RegistryClient;
use runtime::ComponentRuntime;

use crate::config::SystemConfig;
use crate::error::Result;

/// One component process: the concrete event component, its multi-protocol
/// runtime, the leader/follower coordinator and the gateway registry client,
/// wired together and supervised until shutdown.
pub struct ComponentNode {
    identity: ComponentIdentity,
    coordinator: Arc<LeaderFollowerCoordinator>,
    runtime: Arc<ComponentRuntime>,
    registry_client: Arc<RegistryClient>,
    shutdown_tx: watch::Sender<bool>,
}

impl ComponentNode {
    pub async fn new(kind: ComponentKind, instance: u32, config: &SystemConfig) -> Result<Self> {
        let type_name = kind.type_name();
        let host = config.component_host();
        let (http_port, tcp_port, udp_port) = config.component_ports(type_name, instance);

        let identity = ComponentIdentity::new(type_name, host.clone(), http_port, tcp_port, udp_port);
        info!(
            "Initializing {} instance {} ({}) on HTTP {}, TCP {}, UDP {}",
            type_name, instance, identity.instance_id, http_port, tcp_port, udp_port
        );

        let replication_port = config.replication_port(type_name, instance, http_port);
        let (period_ms, initial_delay_ms, push_timeout_ms) = config.replication_settings();
        let mut replication_config = replication::Config::new(replication_port);
        replication_config.period_ms = period_ms;
        replication_config.initial_delay_ms = initial_delay_ms;
        replication_config.push_timeout_ms = push_timeout_ms;
        replication_config.followers = config.followers(type_name, instance)?;

        let coordinator = Arc::new(LeaderFollowerCoordinator::new(replication_config));
        let component = Arc::new(EventComponent::new(kind, identity.clone(), coordinator.clone()));
        coordinator.attach_component(component.clone())?;

        match config.leader_override(type_name, instance) {
            Some((leader_host, leader_port)) => {
                let leader = LeaderReference {
                    leader_id: Some(config.leader_id(type_name, instance)),
                    host: leader_host,
                    port: leader_port,
                };
                coordinator.configure_as_follower(&identity, leader).await?;
            }
            None => coordinator.configure_as_leader(&identity).await?,
        }

        let runtime = Arc::new(ComponentRuntime::new(
            runtime::Config {
                host,
                http_port,
                tcp_port,
                udp_port,
            },
            component,
        ));

        let registry_client = Arc::new(RegistryClient::new(
            registry::Config {
                gateway_host: config.gateway_host(),
                registration_port: config.registration_port(),
                heartbeat_interval_ms: config.heartbeat_interval_ms(),
                request_timeout_ms: push_timeout_ms,
            },
            identity.clone(),
        ));

        let (shutdown_tx, _) = watch::channel(false);

        Ok(Self {
            identity,
            coordinator,
            runtime,
            registry_client,
            shutdown_tx,
        })
    }

    /// Registers with the gateway (best effort), binds the listeners and
    /// starts the coordinator. Registration failure never prevents the
    /// component's own listeners from starting.
    pub async fn start(&self) -> Result<()> {
        if let Err(e) = self.registry_client.register().await {
            warn!("Gateway registration failed, continuing without it: {}", e);
        }

        self.runtime.start().await?;
        self.coordinator.on_start().await?;

        let client = self.registry_client.clone();
        let shutdown = self.shutdown_tx.subscribe();
        tokio::spawn(async move {
            client.run_heartbeat(shutdown).await;
        });

        info!("Component {} started", self.identity.instance_id);
        Ok(())
    }

    /// Safe from any task and safe to call twice.
    pub fn stop(&self) {
        self.runtime.stop();
        self.coordinator.stop();
        let _ = self.shutdown_tx.send(true);
    }

    pub async fn run_until_shutdown(&self) -> Result<()> {
        self.start().await?;

        tokio::signal::ctrl_c().await?;
        info!("Shutdown signal received, stopping {}", self.identity.instance_id);
        self.stop();
        Ok(())
    }
}
