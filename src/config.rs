use std::collections::HashMap;
use std::net::SocketAddr;

use crate::error::{MeshError, Result};

const DEFAULT_CONFIG_FILE: &str = "eventmesh.properties";

/// Simple key=value configuration with typed defaults. Every lookup has a
/// hard-coded fallback, so a missing file just means "run with defaults".
#[derive(Debug, Clone)]
pub struct SystemConfig {
    properties: HashMap<String, String>,
}

impl SystemConfig {
    /// Loads `eventmesh.properties` (path overridable via the
    /// `EVENTMESH_CONFIG` environment variable). An absent file is not an
    /// error.
    pub fn load() -> Self {
        let path = std::env::var("EVENTMESH_CONFIG")
            .unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());

        match std::fs::read_to_string(&path) {
            Ok(content) => {
                tracing::info!("Loaded configuration from {}", path);
                Self::parse(&content)
            }
            Err(_) => {
                tracing::debug!("No configuration file at {}, using defaults", path);
                Self::parse("")
            }
        }
    }

    pub fn parse(content: &str) -> Self {
        let mut properties = HashMap::new();

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if let Some((key, value)) = line.split_once('=') {
                properties.insert(key.trim().to_string(), value.trim().to_string());
            }
        }

        Self { properties }
    }

    pub fn get_str(&self, key: &str, default: &str) -> String {
        self.properties
            .get(key)
            .cloned()
            .unwrap_or_else(|| default.to_string())
    }

    pub fn get_u16(&self, key: &str, default: u16) -> u16 {
        self.typed(key, default)
    }

    pub fn get_u64(&self, key: &str, default: u64) -> u64 {
        self.typed(key, default)
    }

    fn typed<T: std::str::FromStr + Copy>(&self, key: &str, default: T) -> T {
        match self.properties.get(key) {
            Some(raw) => raw.parse().unwrap_or_else(|_| {
                tracing::warn!("Ignoring non-numeric value for {}: {}", key, raw);
                default
            }),
            None => default,
        }
    }

    pub fn component_host(&self) -> String {
        self.get_str("component.host", "localhost")
    }

    pub fn gateway_host(&self) -> String {
        self.get_str("gateway.host", "localhost")
    }

    pub fn registration_port(&self) -> u16 {
        self.get_u16("gateway.registration.port", 8000)
    }

    /// Client-facing ports for one component instance. Instance 1 uses the
    /// base keys, higher instances use `.N`-suffixed keys, each with the
    /// fixed default port set.
    pub fn component_ports(&self, type_name: &str, instance: u32) -> (u16, u16, u16) {
        let (http_default, tcp_default, udp_default) = match (type_name, instance) {
            ("componentA", 1) => (8181, 8182, 8183),
            ("componentA", _) => (8191, 8192, 8193),
            ("componentB", 1) => (8281, 8282, 8283),
            ("componentB", _) => (8291, 8292, 8293),
            (_, 1) => (8081, 8082, 8083),
            _ => (8091, 8092, 8093),
        };

        (
            self.get_u16(
                &Self::instanced_key(type_name, "http.port", instance),
                http_default,
            ),
            self.get_u16(
                &Self::instanced_key(type_name, "tcp.port", instance),
                tcp_default,
            ),
            self.get_u16(
                &Self::instanced_key(type_name, "udp.port", instance),
                udp_default,
            ),
        )
    }

    /// Replication control port; defaults to the HTTP port plus four.
    pub fn replication_port(&self, type_name: &str, instance: u32, http_port: u16) -> u16 {
        self.get_u16(
            &Self::instanced_key(type_name, "replication.port", instance),
            http_port + 4,
        )
    }

    /// Follower configuration: present (host + port of the leader's
    /// replication endpoint) means the instance starts as a follower. Absent
    /// means leader, the default role.
    pub fn leader_override(&self, type_name: &str, instance: u32) -> Option<(String, u16)> {
        let host_key = Self::instanced_key(type_name, "leader.host", instance);
        let port_key = Self::instanced_key(type_name, "leader.port", instance);

        let host = self.properties.get(&host_key)?.clone();
        let port = self.properties.get(&port_key)?.parse::<u16>().ok()?;
        Some((host, port))
    }

    pub fn leader_id(&self, type_name: &str, instance: u32) -> String {
        self.get_str(
            &Self::instanced_key(type_name, "leader.id", instance),
            &format!("leader-{}", type_name),
        )
    }

    /// Replication targets when running as leader: a comma-separated list of
    /// `host:port` replication endpoints.
    pub fn followers(&self, type_name: &str, instance: u32) -> Result<Vec<SocketAddr>> {
        let key = Self::instanced_key(type_name, "followers", instance);
        let raw = match self.properties.get(&key) {
            Some(raw) if !raw.trim().is_empty() => raw,
            _ => return Ok(Vec::new()),
        };

        raw.split(',')
            .map(|entry| {
                entry.trim().parse::<SocketAddr>().map_err(|e| {
                    MeshError::InvalidConfig(format!("Invalid follower address {}: {}", entry, e))
                })
            })
            .collect()
    }

    pub fn replication_settings(&self) -> (u64, u64, u64) {
        (
            self.get_u64("replication.period.ms", 5000),
            self.get_u64("replication.initial.delay.ms", 1000),
            self.get_u64("replication.push.timeout.ms", 2000),
        )
    }

    pub fn heartbeat_interval_ms(&self) -> u64 {
        self.get_u64("registry.heartbeat.interval.ms", 10_000)
    }

    fn instanced_key(type_name: &str, suffix: &str, instance: u32) -> String {
        if instance <= 1 {
            format!("{}.{}", type_name, suffix)
        } else {
            format!("{}.{}.{}", type_name, suffix, instance)
        }
    }
}
