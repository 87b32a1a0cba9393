//! Least-loaded placement over online nodes.

use crate::models::NodeRecord;
use std::cmp::Ordering;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlacementError {
    #[error("no online node available")]
    NoNodeAvailable,
}

/// Online node with the smallest `(cpu + memory) / 2`. Equal scores go to the
/// lexicographically smallest id so the choice does not depend on map order.
pub fn select_best(nodes: &[NodeRecord]) -> Result<&NodeRecord, PlacementError> {
    nodes
        .iter()
        .filter(|n| n.is_online())
        .min_by(|a, b| compare(a, b))
        .ok_or(PlacementError::NoNodeAvailable)
}

fn compare(a: &NodeRecord, b: &NodeRecord) -> Ordering {
    a.load_score()
        .total_cmp(&b.load_score())
        .then_with(|| a.id.cmp(&b.id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NodeStatus;
    use dockyard_common::{NodeRole, RegisterRequest};
    use std::collections::HashMap;

    fn node(id: &str, cpu: f64, mem: f64, status: NodeStatus) -> NodeRecord {
        let mut n = NodeRecord::from_registration(RegisterRequest {
            id: id.into(),
            name: id.into(),
            address: format!("{}:10001", id),
            role: NodeRole::Worker,
            labels: HashMap::new(),
        });
        n.cpu_percent = cpu;
        n.memory_percent = mem;
        n.status = status;
        n
    }

    #[test]
    fn test_empty_cluster() {
        assert_eq!(select_best(&[]), Err(PlacementError::NoNodeAvailable));
    }

    #[test]
    fn test_all_offline() {
        let nodes = vec![
            node("a", 1.0, 1.0, NodeStatus::Offline),
            node("b", 1.0, 1.0, NodeStatus::Error),
        ];
        assert_eq!(select_best(&nodes), Err(PlacementError::NoNodeAvailable));
    }

    #[test]
    fn test_lowest_average_wins() {
        let nodes = vec![
            node("B", 5.0, 80.0, NodeStatus::Online),
            node("A", 10.0, 20.0, NodeStatus::Online),
        ];
        assert_eq!(select_best(&nodes).unwrap().id, "A");
    }

    #[test]
    fn test_offline_nodes_are_skipped_even_if_idle() {
        let nodes = vec![
            node("idle", 0.0, 0.0, NodeStatus::Offline),
            node("busy", 70.0, 70.0, NodeStatus::Online),
        ];
        assert_eq!(select_best(&nodes).unwrap().id, "busy");
    }

    #[test]
    fn test_ties_go_to_smallest_id() {
        let nodes = vec![
            node("worker-c", 30.0, 10.0, NodeStatus::Online),
            node("worker-a", 10.0, 30.0, NodeStatus::Online),
            node("worker-b", 20.0, 20.0, NodeStatus::Online),
        ];
        assert_eq!(select_best(&nodes).unwrap().id, "worker-a");
    }

    #[test]
    fn test_saturated_node_is_still_a_candidate() {
        let nodes = vec![node("full", 100.0, 100.0, NodeStatus::Online)];
        assert_eq!(select_best(&nodes).unwrap().id, "full");
    }
}
