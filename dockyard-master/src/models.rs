use dockyard_common::{NodeRole, RegisterRequest};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use time::OffsetDateTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeStatus {
    Online,
    Offline,
    /// Reserved for collaborators, never set by the registry or the monitor.
    Error,
}

impl fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NodeStatus::Online => "online",
            NodeStatus::Offline => "offline",
            NodeStatus::Error => "error",
        };
        f.write_str(s)
    }
}

/// One cluster member as the master sees it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub id: String,
    pub name: String,
    pub address: String,
    pub role: NodeRole,
    pub status: NodeStatus,
    pub cpu_percent: f64,
    pub memory_percent: f64,
    pub disk_percent: f64,
    pub container_count: u32,
    #[serde(with = "time::serde::rfc3339")]
    pub last_seen: OffsetDateTime,
    pub labels: HashMap<String, String>,
}

impl NodeRecord {
    /// Fresh record for a registration; gauges start at zero.
    pub fn from_registration(req: RegisterRequest) -> Self {
        Self {
            id: req.id,
            name: req.name,
            address: req.address,
            role: req.role,
            status: NodeStatus::Online,
            cpu_percent: 0.0,
            memory_percent: 0.0,
            disk_percent: 0.0,
            container_count: 0,
            last_seen: OffsetDateTime::now_utc(),
            labels: req.labels,
        }
    }

    /// Placement score, lower is better.
    pub fn load_score(&self) -> f64 {
        (self.cpu_percent + self.memory_percent) / 2.0
    }

    pub fn is_online(&self) -> bool {
        self.status == NodeStatus::Online
    }
}
