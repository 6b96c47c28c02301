use std::sync::Arc;

use async_trait::async_trait;

use replication::{
    ComponentIdentity, LeaderFollowerCoordinator, Result as ReplicationResult, StateComponent,
};
use runtime::{HttpRequest, HttpResponse, ProtocolHandler};

use crate::{now_millis, ComponentKind, EventLog};

/// Concrete event-processing component. State is an append-only event log;
/// the same implementation serves both component kinds.
///
/// Writes consult the coordinator: a follower answers TCP `ADD_EVENT` with a
/// redirect naming the leader instead of mutating local state, and a leader
/// triggers an out-of-band replication push after each TCP append.
pub struct EventComponent {
    kind: ComponentKind,
    identity: ComponentIdentity,
    log: EventLog,
    coordinator: Arc<LeaderFollowerCoordinator>,
}

impl EventComponent {
    pub fn new(
        kind: ComponentKind,
        identity: ComponentIdentity,
        coordinator: Arc<LeaderFollowerCoordinator>,
    ) -> Self {
        Self {
            kind,
            identity,
            log: EventLog::new(),
            coordinator,
        }
    }

    pub fn identity(&self) -> &ComponentIdentity {
        &self.identity
    }

    pub fn event_count(&self) -> usize {
        self.log.len()
    }

    pub fn events(&self) -> Arc<Vec<String>> {
        self.log.snapshot()
    }

    fn append_timestamped(&self, data: &str) -> (String, usize) {
        let event = format!("{}: {}", now_millis(), data);
        let index = self.log.append(event.clone());
        (event, index)
    }

    async fn add_event_tcp(&self, data: &str) -> String {
        if !self.coordinator.is_leader().await {
            if let Some(leader_id) = self
                .coordinator
                .current_leader()
                .await
                .and_then(|leader| leader.leader_id)
            {
                return format!(
                    "REDIRECT|{}|Operação de escrita deve ser enviada ao líder",
                    leader_id
                );
            }
        }

        let (_, index) = self.append_timestamped(data);

        if self.coordinator.is_leader().await {
            let coordinator = self.coordinator.clone();
            tokio::spawn(async move {
                if let Err(e) = coordinator.replicate_now().await {
                    tracing::warn!("Out-of-band replication failed: {}", e);
                }
            });
        }

        format!("SUCCESS|Evento adicionado com ID: {}", index)
    }

    async fn leader_line(&self) -> String {
        let leader = self.coordinator.current_leader().await;

        if self.coordinator.is_leader().await {
            match leader {
                Some(reference) => format!(
                    "LEADER|{}|{}|{}",
                    self.identity.instance_id, self.identity.host, reference.port
                ),
                None => "UNKNOWN_LEADER".to_string(),
            }
        } else {
            match leader.and_then(|reference| reference.leader_id) {
                Some(leader_id) => format!("LEADER|{}", leader_id),
                None => "UNKNOWN_LEADER".to_string(),
            }
        }
    }
}

impl StateComponent for EventComponent {
    fn on_become_leader(&self) {
        self.log.append(format!(
            "{}: LEADERSHIP_CHANGE - {} tornou-se líder",
            now_millis(),
            self.identity.instance_id
        ));
    }

    fn on_become_follower(&self) {
        self.log.append(format!(
            "{}: LEADERSHIP_CHANGE - {} tornou-se seguidor",
            now_millis(),
            self.identity.instance_id
        ));
    }

    fn serialize_state(&self) -> String {
        serde_json::to_string(self.log.snapshot().as_ref()).unwrap_or_else(|e| {
            tracing::error!("Failed to serialize event log: {}", e);
            "[]".to_string()
        })
    }

    fn process_state_update(&self, payload: &str) -> ReplicationResult<()> {
        let events: Vec<String> = serde_json::from_str(payload)?;
        tracing::debug!(
            "{} restored {} event(s) from leader state",
            self.identity.instance_id,
            events.len()
        );
        self.log.replace(events);
        Ok(())
    }
}

#[async_trait]
impl ProtocolHandler for EventComponent {
    async fn handle_http(&self, request: HttpRequest) -> HttpResponse {
        match (request.method.as_str(), request.path.as_str()) {
            ("GET", "/events") => {
                let mut body = String::new();
                for event in self.log.snapshot().iter() {
                    body.push_str(event);
                    body.push('\n');
                }
                HttpResponse::ok(body)
            }
            ("POST", "/events") => {
                let (event, _) = self.append_timestamped(&request.body);
                HttpResponse::created(format!("Evento adicionado: {}", event))
            }
            (_, "/count") => {
                HttpResponse::ok(format!("Quantidade de eventos: {}", self.log.len()))
            }
            (_, "/info") => HttpResponse::ok(format!(
                "Instância do {} {}\nQuantidade de eventos: {}\nExecutando em: {}\nPorta HTTP: {}",
                self.kind.display_name(),
                self.identity.instance_id,
                self.log.len(),
                self.identity.host,
                self.identity.http_port
            )),
            _ => HttpResponse::not_found("Endpoint desconhecido"),
        }
    }

    async fn handle_tcp(&self, line: &str) -> String {
        let (action, data) = match line.split_once('|') {
            Some((action, data)) => (action.to_uppercase(), Some(data)),
            None => (line.to_uppercase(), None),
        };

        match action.as_str() {
            "ADD_EVENT" => match data {
                Some(data) => self.add_event_tcp(data).await,
                None => "ERROR|Formato ADD_EVENT inválido, esperado: ADD_EVENT|DATA".to_string(),
            },
            "GET_EVENTS" => format!("EVENTS|{}", self.log.snapshot().join("|")),
            "COUNT" => format!("COUNT|{}", self.log.len()),
            "INFO" => {
                let role = if self.coordinator.is_leader().await {
                    "LEADER"
                } else {
                    "FOLLOWER"
                };
                format!(
                    "INFO|{}|{}|{}|{}",
                    self.kind.display_name(),
                    self.identity.instance_id,
                    self.log.len(),
                    role
                )
            }
            "LEADER" => self.leader_line().await,
            _ => format!("ERROR|Ação desconhecida: {}", action),
        }
    }

    // UDP carries a reduced surface: no redirect semantics, no GET_EVENTS,
    // no LEADER.
    async fn handle_udp(&self, datagram: &str) -> String {
        let (action, data) = match datagram.split_once('|') {
            Some((action, data)) => (action.to_uppercase(), Some(data)),
            None => (datagram.to_uppercase(), None),
        };

        match action.as_str() {
            "ADD_EVENT" => match data {
                Some(data) => {
                    let (_, index) = self.append_timestamped(data);
                    format!("SUCCESS|Evento adicionado com ID: {}", index)
                }
                None => "ERROR|Formato ADD_EVENT inválido, esperado: ADD_EVENT|DATA".to_string(),
            },
            "COUNT" => format!("COUNT|{}", self.log.len()),
            "INFO" => format!(
                "INFO|{}|{}|{}",
                self.kind.display_name(),
                self.identity.instance_id,
                self.log.len()
            ),
            _ => format!("ERROR|Ação desconhecida: {}", action),
        }
    }
}
