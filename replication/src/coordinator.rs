use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use tokio::sync::{watch, RwLock};

use crate::channel::{send_message, ReplicationMessage, ReplicationReceiver};
use crate::{ComponentIdentity, Config, LeaderReference, ReplicationError, Result, Role, StateComponent};

/// Owns the role and the current leader reference, and drives periodic
/// full-state replication. This is a fixed two-node push model: roles are
/// assigned before start and never renegotiated, pushes are best effort with
/// no acknowledgement tracking, and a dropped push is silently recovered by
/// the next scheduled tick.
pub struct LeaderFollowerCoordinator {
    config: Config,
    role: RwLock<Role>,
    leader: Arc<RwLock<Option<LeaderReference>>>,
    component: OnceLock<Arc<dyn StateComponent>>,
    started: AtomicBool,
    shutdown_tx: watch::Sender<bool>,
}

impl LeaderFollowerCoordinator {
    pub fn new(config: Config) -> Self {
        let (shutdown_tx, _) = watch::channel(false);

        Self {
            config,
            role: RwLock::new(Role::Leader),
            leader: Arc::new(RwLock::new(None)),
            component: OnceLock::new(),
            started: AtomicBool::new(false),
            shutdown_tx,
        }
    }

    /// Binds the component whose callbacks this coordinator drives. Must be
    /// called exactly once, before `on_start`.
    pub fn attach_component(&self, component: Arc<dyn StateComponent>) -> Result<()> {
        self.component
            .set(component)
            .map_err(|_| ReplicationError::Configuration("component already attached".to_string()))
    }

    pub async fn configure_as_leader(&self, identity: &ComponentIdentity) -> Result<()> {
        self.ensure_not_started()?;

        *self.role.write().await = Role::Leader;
        *self.leader.write().await = Some(LeaderReference {
            leader_id: Some(identity.instance_id.clone()),
            host: identity.host.clone(),
            port: self.config.replication_port,
        });

        tracing::info!(
            "Configured {} as leader with {} follower(s)",
            identity.instance_id,
            self.config.followers.len()
        );
        Ok(())
    }

    pub async fn configure_as_follower(
        &self,
        identity: &ComponentIdentity,
        leader: LeaderReference,
    ) -> Result<()> {
        self.ensure_not_started()?;

        tracing::info!(
            "Configured {} as follower of {} at {}:{}",
            identity.instance_id,
            leader.leader_id.as_deref().unwrap_or("?"),
            leader.host,
            leader.port
        );

        *self.role.write().await = Role::Follower;
        *self.leader.write().await = Some(leader);
        Ok(())
    }

    /// Fires the role callback and starts the role's background work: the
    /// replication timer on a leader, the receiving side of the channel on a
    /// follower.
    pub async fn on_start(&self) -> Result<()> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(ReplicationError::Configuration(
                "coordinator already started".to_string(),
            ));
        }

        // A failed start must not leave the coordinator claiming to run.
        if let Err(e) = self.start_role_tasks().await {
            self.started.store(false, Ordering::SeqCst);
            return Err(e);
        }
        Ok(())
    }

    async fn start_role_tasks(&self) -> Result<()> {
        let component = self.attached_component()?;

        match *self.role.read().await {
            Role::Leader => {
                component.on_become_leader();
                self.announce_leadership().await;

                let config = self.config.clone();
                let shutdown = self.shutdown_tx.subscribe();
                tokio::spawn(async move {
                    Self::replication_loop(component, config, shutdown).await;
                });
            }
            Role::Follower => {
                component.on_become_follower();

                let receiver =
                    ReplicationReceiver::bind("0.0.0.0", self.config.replication_port).await?;
                tracing::info!(
                    "Replication receiver listening on port {}",
                    self.config.replication_port
                );

                let leader = self.leader.clone();
                let shutdown = self.shutdown_tx.subscribe();
                tokio::spawn(async move {
                    receiver.run(component, leader, shutdown).await;
                });
            }
        }

        Ok(())
    }

    /// Leader-only out-of-band push of the current state to every follower.
    pub async fn replicate_now(&self) -> Result<()> {
        if !self.is_leader().await {
            return Err(ReplicationError::NotLeader);
        }

        let component = self.attached_component()?;
        Self::push_snapshot(&component, &self.config).await;
        Ok(())
    }

    pub async fn is_leader(&self) -> bool {
        *self.role.read().await == Role::Leader
    }

    pub async fn current_leader(&self) -> Option<LeaderReference> {
        self.leader.read().await.clone()
    }

    /// Cancels the replication timer or receive loop. Safe to call twice and
    /// from any task.
    pub fn stop(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    fn ensure_not_started(&self) -> Result<()> {
        if self.started.load(Ordering::SeqCst) {
            return Err(ReplicationError::Configuration(
                "role cannot be configured after start".to_string(),
            ));
        }
        Ok(())
    }

    fn attached_component(&self) -> Result<Arc<dyn StateComponent>> {
        self.component
            .get()
            .cloned()
            .ok_or_else(|| ReplicationError::Configuration("no component attached".to_string()))
    }

    async fn announce_leadership(&self) {
        let reference = match self.leader.read().await.clone() {
            Some(reference) => reference,
            None => return,
        };

        let message = ReplicationMessage::announcement(&reference);
        let timeout = Duration::from_millis(self.config.push_timeout_ms);

        for addr in &self.config.followers {
            if let Err(e) = send_message(*addr, &message, timeout).await {
                tracing::warn!("Leader announcement to {} failed: {}", addr, e);
            }
        }
    }

    async fn replication_loop(
        component: Arc<dyn StateComponent>,
        config: Config,
        mut shutdown: watch::Receiver<bool>,
    ) {
        tokio::select! {
            _ = tokio::time::sleep(Duration::from_millis(config.initial_delay_ms)) => {}
            _ = shutdown.changed() => return,
        }

        let mut interval = tokio::time::interval(Duration::from_millis(config.period_ms));

        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                _ = interval.tick() => {
                    Self::push_snapshot(&component, &config).await;
                }
            }
        }

        tracing::debug!("Replication timer stopped");
    }

    async fn push_snapshot(component: &Arc<dyn StateComponent>, config: &Config) {
        if config.followers.is_empty() {
            return;
        }

        let message = ReplicationMessage::snapshot(component.serialize_state());
        let timeout = Duration::from_millis(config.push_timeout_ms);

        for addr in &config.followers {
            if let Err(e) = send_message(*addr, &message, timeout).await {
                tracing::warn!("Replication push to {} failed: {}", addr, e);
            }
        }
    }
}
