//! Workload dispatch: pick a node, forward the creation request to it.

use crate::error::ApiError;
use crate::models::NodeRecord;
use crate::registry::NodeRegistry;
use crate::state::AppState;
use dockyard_common::WorkloadSpec;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::info;

/// Body of `POST /api/containers/schedule`. Without `node_id` the least-loaded node is used.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScheduleRequest {
    pub image: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub ports: HashMap<String, String>,
    #[serde(default)]
    pub env: HashMap<String, String>,
    #[serde(default)]
    pub labels: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleOutcome {
    pub status: String,
    pub node_id: String,
    pub node: String,
    /// The worker's reply, as received.
    pub container: serde_json::Value,
}

impl ScheduleRequest {
    fn into_spec(self) -> WorkloadSpec {
        let name = if self.name.trim().is_empty() {
            generated_name()
        } else {
            self.name
        };

        WorkloadSpec {
            image: self.image,
            name,
            ports: self.ports,
            env: self.env,
            labels: self.labels,
        }
    }
}

fn generated_name() -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    format!("dockyard-{}", &id[..8])
}

/// Resolves the target node: the requested one if it is online, else the least-loaded.
pub fn pick_target(registry: &NodeRegistry, node_id: Option<&str>) -> Result<NodeRecord, ApiError> {
    match node_id.filter(|id| !id.is_empty()) {
        Some(id) => {
            let node = registry.get(id).ok_or_else(|| ApiError::UnknownNode(id.to_string()))?;
            if !node.is_online() {
                return Err(ApiError::NodeNotOnline(id.to_string()));
            }
            Ok(node)
        }
        None => Ok(registry.select_best()?),
    }
}

pub async fn schedule(state: &AppState, mut req: ScheduleRequest) -> Result<ScheduleOutcome, ApiError> {
    let target = pick_target(&state.registry, req.node_id.take().as_deref())?;
    let spec = req.into_spec();

    info!("scheduling {} ({}) on node {} at {}", spec.name, spec.image, target.id, target.address);
    let container = state.peers.create_workload(&target, &spec).await?;

    Ok(ScheduleOutcome {
        status: "success".into(),
        node_id: target.id,
        node: target.name,
        container,
    })
}
