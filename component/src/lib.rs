mod event_component;
mod event_log;

pub use event_component::EventComponent;
pub use event_log::EventLog;

use serde::{Deserialize, Serialize};

/// Which concrete component this process runs. The two kinds are structurally
/// identical event-processing services; only their names differ, so a tag is
/// enough to tell them apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ComponentKind {
    A,
    B,
}

impl ComponentKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            ComponentKind::A => "componentA",
            ComponentKind::B => "componentB",
        }
    }

    /// Name used in protocol responses (`INFO|Componente B|...`).
    pub fn display_name(&self) -> &'static str {
        match self {
            ComponentKind::A => "Componente A",
            ComponentKind::B => "Componente B",
        }
    }
}

pub(crate) fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
