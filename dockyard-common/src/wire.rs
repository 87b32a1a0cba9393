//! Control-plane message shapes shared by master and agent.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Role a node plays in the cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeRole {
    Master,
    #[default]
    Worker,
}

impl fmt::Display for NodeRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeRole::Master => f.write_str("master"),
            NodeRole::Worker => f.write_str("worker"),
        }
    }
}

/// Body of `POST /api/nodes/register`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub id: String,
    pub name: String,
    pub address: String,
    #[serde(default, alias = "mode")]
    pub role: NodeRole,
    #[serde(default)]
    pub labels: HashMap<String, String>,
}

/// Body of `POST /api/nodes/heartbeat`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeartbeatRequest {
    pub node_id: String,
    pub cpu: f64,
    pub memory: f64,
    pub disk: f64,
    pub containers: u32,
}

/// A workload to start on a node. `ports` maps host port to container port.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkloadSpec {
    pub image: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub ports: HashMap<String, String>,
    #[serde(default)]
    pub env: HashMap<String, String>,
    #[serde(default)]
    pub labels: HashMap<String, String>,
}

/// One container as reported by a node's runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerSummary {
    pub id: String,
    pub name: String,
    pub image: String,
    pub status: String,
    pub state: String,
}

/// Reply of a worker's `POST /api/containers/create`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreatedWorkload {
    pub status: String,
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusReply {
    pub status: String,
}

impl StatusReply {
    pub fn success() -> Self {
        Self { status: "success".to_string() }
    }
}
