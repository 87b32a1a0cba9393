/**
 * NODE REGISTRY - In-memory membership table of the master
 *
 * ROLE: One record per cluster member, keyed by the node-chosen id. Filled by
 * registrations, refreshed by heartbeats, demoted by the heartbeat monitor.
 *
 * CONCURRENCY: RwLock, readers (get/list/select_best) run together, every write is
 * exclusive. Records are never deleted; the table lives as long as the process.
 */

use crate::models::{NodeRecord, NodeStatus};
use crate::placement::{self, PlacementError};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;
use tracing::{debug, info};

pub type NodesMap = HashMap<String, NodeRecord>;

#[derive(Debug, Default)]
pub struct NodeRegistry {
    nodes: RwLock<NodesMap>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or wholesale replaces the record for `record.id`.
    /// Status and last_seen are always reset, whatever the caller sent.
    pub fn register(&self, mut record: NodeRecord) {
        record.status = NodeStatus::Online;
        record.last_seen = OffsetDateTime::now_utc();

        info!("registered node {} ({}) at {}", record.id, record.name, record.address);
        self.nodes.write().insert(record.id.clone(), record);
    }

    /// Refreshes gauges and last_seen. Unknown ids are ignored and `false` is returned.
    pub fn update_resources(&self, id: &str, cpu: f64, memory: f64, disk: f64, containers: u32) -> bool {
        let mut nodes = self.nodes.write();
        let Some(node) = nodes.get_mut(id) else {
            debug!("resource update for unknown node {} dropped", id);
            return false;
        };

        node.cpu_percent = cpu;
        node.memory_percent = memory;
        node.disk_percent = disk;
        node.container_count = containers;
        node.last_seen = OffsetDateTime::now_utc();
        true
    }

    /// Heartbeat receipt: gauges, last_seen and an offline node back to online,
    /// all under one write lock so a concurrent sweep cannot leave it demoted.
    /// `error` is kept as is. Returns `None` for unknown ids, otherwise whether
    /// the node was revived.
    pub fn record_heartbeat(&self, id: &str, cpu: f64, memory: f64, disk: f64, containers: u32) -> Option<bool> {
        let mut nodes = self.nodes.write();
        let Some(node) = nodes.get_mut(id) else {
            debug!("heartbeat for unknown node {} dropped", id);
            return None;
        };

        node.cpu_percent = cpu;
        node.memory_percent = memory;
        node.disk_percent = disk;
        node.container_count = containers;
        node.last_seen = OffsetDateTime::now_utc();

        let revived = node.status == NodeStatus::Offline;
        if revived {
            node.status = NodeStatus::Online;
        }
        Some(revived)
    }

    /// Sets status and refreshes last_seen. Unknown ids are ignored.
    pub fn update_status(&self, id: &str, status: NodeStatus) -> bool {
        let mut nodes = self.nodes.write();
        let Some(node) = nodes.get_mut(id) else {
            return false;
        };

        node.status = status;
        node.last_seen = OffsetDateTime::now_utc();
        true
    }

    pub fn get(&self, id: &str) -> Option<NodeRecord> {
        self.nodes.read().get(id).cloned()
    }

    /// Snapshot of every record, in no particular order.
    pub fn list(&self) -> Vec<NodeRecord> {
        self.nodes.read().values().cloned().collect()
    }

    /// Snapshot of online records, sorted by id.
    pub fn online(&self) -> Vec<NodeRecord> {
        let mut online: Vec<NodeRecord> = self
            .nodes
            .read()
            .values()
            .filter(|n| n.is_online())
            .cloned()
            .collect();
        online.sort_by(|a, b| a.id.cmp(&b.id));
        online
    }

    pub fn select_best(&self) -> Result<NodeRecord, PlacementError> {
        let nodes = self.list();
        placement::select_best(&nodes).cloned()
    }

    /// Flips every online node silent for longer than `timeout` (as of `now`) to offline.
    ///
    /// Runs under a single write lock so a heartbeat landing mid-sweep is never
    /// overwritten. last_seen is left as it was. Returns the demoted ids.
    pub fn mark_stale_offline(&self, now: OffsetDateTime, timeout: Duration) -> Vec<String> {
        let mut demoted = Vec::new();
        let mut nodes = self.nodes.write();

        for node in nodes.values_mut() {
            if node.is_online() && now - node.last_seen > timeout {
                node.status = NodeStatus::Offline;
                demoted.push(node.id.clone());
            }
        }

        demoted
    }

    pub fn len(&self) -> usize {
        self.nodes.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.read().is_empty()
    }
}

pub type SharedNodeRegistry = Arc<NodeRegistry>;

#[cfg(test)]
mod tests {
    use super::*;
    use dockyard_common::{NodeRole, RegisterRequest};
    use std::collections::HashMap;

    fn record(id: &str) -> NodeRecord {
        NodeRecord::from_registration(RegisterRequest {
            id: id.into(),
            name: format!("{}-name", id),
            address: format!("{}:10001", id),
            role: NodeRole::Worker,
            labels: HashMap::new(),
        })
    }

    #[test]
    fn test_register_forces_online_and_now() {
        let registry = NodeRegistry::new();
        let mut r = record("a");
        r.status = NodeStatus::Error;
        r.last_seen = OffsetDateTime::UNIX_EPOCH;
        let before = OffsetDateTime::now_utc();

        registry.register(r);

        let stored = registry.get("a").unwrap();
        assert_eq!(stored.status, NodeStatus::Online);
        assert!(stored.last_seen >= before);
    }

    #[test]
    fn test_reregistration_replaces_whole_record() {
        let registry = NodeRegistry::new();
        let mut first = record("a");
        first.labels.insert("zone".into(), "eu".into());
        registry.register(first);
        assert!(registry.update_resources("a", 90.0, 80.0, 70.0, 12));

        let mut second = record("a");
        second.address = "10.1.1.1:10001".into();
        registry.register(second);

        let stored = registry.get("a").unwrap();
        assert_eq!(registry.len(), 1);
        assert_eq!(stored.address, "10.1.1.1:10001");
        assert_eq!(stored.cpu_percent, 0.0);
        assert_eq!(stored.memory_percent, 0.0);
        assert_eq!(stored.container_count, 0);
        assert!(stored.labels.is_empty());
    }

    #[test]
    fn test_update_resources() {
        let registry = NodeRegistry::new();
        registry.register(record("a"));
        let before = registry.get("a").unwrap().last_seen;

        assert!(registry.update_resources("a", 12.5, 40.0, 63.0, 4));

        let stored = registry.get("a").unwrap();
        assert_eq!(stored.cpu_percent, 12.5);
        assert_eq!(stored.memory_percent, 40.0);
        assert_eq!(stored.disk_percent, 63.0);
        assert_eq!(stored.container_count, 4);
        assert!(stored.last_seen >= before);
    }

    #[test]
    fn test_update_resources_for_unknown_node_creates_nothing() {
        let registry = NodeRegistry::new();
        registry.register(record("a"));
        let snapshot = registry.list();

        assert!(!registry.update_resources("ghost", 1.0, 1.0, 1.0, 1));

        assert_eq!(registry.list(), snapshot);
        assert!(registry.get("ghost").is_none());
    }

    #[test]
    fn test_heartbeat_after_a_sweep_revives_the_node() {
        let registry = NodeRegistry::new();
        registry.register(record("w"));
        let seen = registry.get("w").unwrap().last_seen;

        // sweep lands between the node being read as online and its heartbeat
        assert!(registry.get("w").unwrap().is_online());
        registry.mark_stale_offline(seen + time::Duration::seconds(31), Duration::from_secs(30));
        assert_eq!(registry.get("w").unwrap().status, NodeStatus::Offline);

        assert_eq!(registry.record_heartbeat("w", 20.0, 30.0, 40.0, 3), Some(true));
        let stored = registry.get("w").unwrap();
        assert_eq!(stored.status, NodeStatus::Online);
        assert_eq!(stored.cpu_percent, 20.0);
        assert_eq!(stored.container_count, 3);

        assert_eq!(registry.record_heartbeat("w", 21.0, 30.0, 40.0, 3), Some(false));
    }

    #[test]
    fn test_heartbeat_keeps_error_status_and_ignores_unknown() {
        let registry = NodeRegistry::new();
        registry.register(record("a"));
        registry.update_status("a", NodeStatus::Error);

        assert_eq!(registry.record_heartbeat("a", 1.0, 1.0, 1.0, 0), Some(false));
        assert_eq!(registry.get("a").unwrap().status, NodeStatus::Error);

        assert_eq!(registry.record_heartbeat("ghost", 1.0, 1.0, 1.0, 0), None);
        assert!(registry.get("ghost").is_none());
    }

    #[test]
    fn test_update_status() {
        let registry = NodeRegistry::new();
        registry.register(record("a"));

        assert!(registry.update_status("a", NodeStatus::Error));
        assert_eq!(registry.get("a").unwrap().status, NodeStatus::Error);
        assert!(!registry.update_status("ghost", NodeStatus::Online));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_mark_stale_offline_respects_timeout() {
        let registry = NodeRegistry::new();
        registry.register(record("a"));
        let seen = registry.get("a").unwrap().last_seen;
        let timeout = Duration::from_secs(30);

        let demoted = registry.mark_stale_offline(seen + time::Duration::seconds(30), timeout);
        assert!(demoted.is_empty());
        assert!(registry.get("a").unwrap().is_online());

        let demoted = registry.mark_stale_offline(seen + time::Duration::seconds(31), timeout);
        assert_eq!(demoted, vec!["a".to_string()]);

        let stored = registry.get("a").unwrap();
        assert_eq!(stored.status, NodeStatus::Offline);
        assert_eq!(stored.last_seen, seen);
    }

    #[test]
    fn test_mark_stale_offline_ignores_non_online() {
        let registry = NodeRegistry::new();
        registry.register(record("a"));
        registry.update_status("a", NodeStatus::Error);
        let far = OffsetDateTime::now_utc() + time::Duration::hours(1);

        assert!(registry.mark_stale_offline(far, Duration::from_secs(30)).is_empty());
        assert_eq!(registry.get("a").unwrap().status, NodeStatus::Error);
    }

    #[test]
    fn test_online_is_sorted_and_filtered() {
        let registry = NodeRegistry::new();
        for id in ["c", "a", "b"] {
            registry.register(record(id));
        }
        registry.update_status("b", NodeStatus::Offline);

        let ids: Vec<String> = registry.online().into_iter().map(|n| n.id).collect();
        assert_eq!(ids, vec!["a", "c"]);
    }

    #[test]
    fn test_select_best_through_registry() {
        let registry = NodeRegistry::new();
        assert_eq!(registry.select_best(), Err(PlacementError::NoNodeAvailable));

        registry.register(record("A"));
        registry.register(record("B"));
        registry.update_resources("A", 10.0, 20.0, 0.0, 0);
        registry.update_resources("B", 5.0, 80.0, 0.0, 0);

        assert_eq!(registry.select_best().unwrap().id, "A");
    }

    #[test]
    fn test_concurrent_writers_and_readers() {
        let registry = Arc::new(NodeRegistry::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let registry = registry.clone();
                std::thread::spawn(move || {
                    let id = format!("node-{}", i);
                    registry.register(record(&id));
                    for n in 0..100 {
                        registry.update_resources(&id, n as f64, n as f64, 0.0, n);
                        let _ = registry.list();
                        let _ = registry.select_best();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(registry.len(), 8);
        assert!(registry.list().iter().all(|n| n.cpu_percent == 99.0));
    }
}
