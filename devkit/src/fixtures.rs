//! Ready-made wire payloads for tests.

use dockyard_common::{ContainerSummary, HeartbeatRequest, NodeRole, RegisterRequest, WorkloadSpec};
use std::collections::HashMap;

/// Worker registration for `id` reachable at `address`.
pub fn register_request(id: &str, address: &str) -> RegisterRequest {
    RegisterRequest {
        id: id.to_string(),
        name: format!("{}-host", id),
        address: address.to_string(),
        role: NodeRole::Worker,
        labels: HashMap::new(),
    }
}

pub fn heartbeat(id: &str, cpu: f64, memory: f64) -> HeartbeatRequest {
    HeartbeatRequest {
        node_id: id.to_string(),
        cpu,
        memory,
        disk: 0.0,
        containers: 0,
    }
}

pub fn container(id: &str, name: &str) -> ContainerSummary {
    ContainerSummary {
        id: id.to_string(),
        name: name.to_string(),
        image: "nginx:alpine".to_string(),
        status: "Up 2 minutes".to_string(),
        state: "running".to_string(),
    }
}

pub fn workload(image: &str) -> WorkloadSpec {
    WorkloadSpec {
        image: image.to_string(),
        ..Default::default()
    }
}
