//! Cluster-wide container listing.
//!
//! Every online node is queried concurrently, each call bounded by the peer client
//! timeout. A node that fails in any way is logged and left out; the caller only
//! ever sees the containers that could be collected.

use crate::models::NodeRecord;
use crate::state::AppState;
use dockyard_common::ContainerSummary;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

pub const LOCAL_NODE_ID: &str = "local";

/// A container tagged with the node it runs on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedContainer {
    pub node_id: String,
    pub node: String,
    pub id: String,
    pub name: String,
    pub image: String,
    pub status: String,
    pub state: String,
}

impl AggregatedContainer {
    fn tag(node_id: &str, node: &str, c: ContainerSummary) -> Self {
        Self {
            node_id: node_id.to_string(),
            node: node.to_string(),
            id: c.id,
            name: c.name,
            image: c.image,
            status: c.status,
            state: c.state,
        }
    }
}

/// Local containers first (when enabled), then every reachable online node in id order.
pub async fn collect_all(state: &AppState) -> Vec<AggregatedContainer> {
    let mut out = Vec::new();

    if state.config.include_local {
        match state.runtime.list().await {
            Ok(containers) => {
                let name = state.config.master_name.as_deref().unwrap_or(LOCAL_NODE_ID);
                out.extend(containers.into_iter().map(|c| AggregatedContainer::tag(LOCAL_NODE_ID, name, c)));
            }
            Err(e) => warn!("local container listing failed: {}", e),
        }
    }

    // online() is sorted by id, join_all keeps input order
    let nodes = state.registry.online();
    let results = join_all(nodes.iter().map(|node| query_node(state, node))).await;

    for (node, containers) in nodes.iter().zip(results) {
        if let Some(containers) = containers {
            out.extend(containers.into_iter().map(|c| AggregatedContainer::tag(&node.id, &node.name, c)));
        }
    }
    out
}

async fn query_node(state: &AppState, node: &NodeRecord) -> Option<Vec<ContainerSummary>> {
    match state.peers.list_containers(node).await {
        Ok(containers) => {
            debug!("node {} reported {} containers", node.id, containers.len());
            Some(containers)
        }
        Err(e) => {
            warn!("skipping node {} in container listing: {}", node.id, e);
            None
        }
    }
}
