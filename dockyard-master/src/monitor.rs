use crate::registry::SharedNodeRegistry;
use std::time::Duration;
use time::OffsetDateTime;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Timeout-based failure detector: nodes silent for longer than `node_timeout`
/// are flipped to offline on the next sweep. It never brings a node back online.
#[derive(Clone)]
pub struct HeartbeatMonitor {
    registry: SharedNodeRegistry,
    sweep_interval: Duration,
    node_timeout: Duration,
}

impl HeartbeatMonitor {
    pub fn new(registry: SharedNodeRegistry, sweep_interval: Duration, node_timeout: Duration) -> Self {
        Self {
            registry,
            sweep_interval,
            node_timeout,
        }
    }

    /// One pass over the registry as of `now`. Returns the demoted node ids.
    pub fn sweep(&self, now: OffsetDateTime) -> Vec<String> {
        let demoted = self.registry.mark_stale_offline(now, self.node_timeout);
        for id in &demoted {
            warn!("node {} missed heartbeats for more than {:?}, marked offline", id, self.node_timeout);
        }
        demoted
    }

    /// Sweeps every `sweep_interval` until `shutdown` is cancelled.
    pub fn spawn(self, shutdown: CancellationToken) -> JoinHandle<()> {
        info!(
            "starting heartbeat monitor (sweep every {:?}, timeout {:?})",
            self.sweep_interval, self.node_timeout
        );

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.sweep_interval);

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = interval.tick() => {
                        self.sweep(OffsetDateTime::now_utc());
                    }
                }
            }

            info!("heartbeat monitor stopped");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NodeRecord, NodeStatus};
    use crate::registry::NodeRegistry;
    use dockyard_common::{NodeRole, RegisterRequest};
    use std::collections::HashMap;
    use std::sync::Arc;

    fn register(registry: &NodeRegistry, id: &str) {
        registry.register(NodeRecord::from_registration(RegisterRequest {
            id: id.into(),
            name: id.into(),
            address: format!("{}:10001", id),
            role: NodeRole::Worker,
            labels: HashMap::new(),
        }));
    }

    #[test]
    fn test_sweep_demotes_only_stale_nodes() {
        let registry = Arc::new(NodeRegistry::new());
        register(&registry, "stale");
        register(&registry, "fresh");
        let monitor = HeartbeatMonitor::new(registry.clone(), Duration::from_secs(10), Duration::from_secs(30));
        let base = OffsetDateTime::now_utc();

        assert!(monitor.sweep(base + time::Duration::seconds(20)).is_empty());

        // "fresh" reports again, "stale" stays silent
        registry.update_resources("fresh", 1.0, 1.0, 1.0, 0);
        let demoted = monitor.sweep(registry.get("fresh").unwrap().last_seen + time::Duration::seconds(1));
        assert!(demoted.is_empty());

        let stale_seen = registry.get("stale").unwrap().last_seen;
        let demoted = monitor.sweep(stale_seen + time::Duration::seconds(31));
        assert!(demoted.contains(&"stale".to_string()));
        assert_eq!(registry.get("stale").unwrap().status, NodeStatus::Offline);
    }

    #[test]
    fn test_sweep_never_promotes() {
        let registry = Arc::new(NodeRegistry::new());
        register(&registry, "a");
        registry.update_status("a", NodeStatus::Offline);
        let monitor = HeartbeatMonitor::new(registry.clone(), Duration::from_secs(10), Duration::from_secs(30));

        monitor.sweep(OffsetDateTime::now_utc());

        assert_eq!(registry.get("a").unwrap().status, NodeStatus::Offline);
    }

    #[tokio::test]
    async fn test_loop_marks_silent_node_offline_within_sweep_plus_timeout() {
        let registry = Arc::new(NodeRegistry::new());
        register(&registry, "worker");
        let sweep = Duration::from_millis(20);
        let timeout = Duration::from_millis(150);
        let shutdown = CancellationToken::new();
        let handle = HeartbeatMonitor::new(registry.clone(), sweep, timeout).spawn(shutdown.clone());

        // well inside the timeout: still online
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(registry.get("worker").unwrap().is_online());

        // past sweep + timeout, with slack for the scheduler
        tokio::time::sleep(sweep + timeout + Duration::from_millis(200)).await;
        assert_eq!(registry.get("worker").unwrap().status, NodeStatus::Offline);

        shutdown.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_heartbeats_keep_node_online() {
        let registry = Arc::new(NodeRegistry::new());
        register(&registry, "worker");
        let shutdown = CancellationToken::new();
        let handle = HeartbeatMonitor::new(registry.clone(), Duration::from_millis(10), Duration::from_millis(200))
            .spawn(shutdown.clone());

        for _ in 0..10 {
            tokio::time::sleep(Duration::from_millis(30)).await;
            registry.update_resources("worker", 1.0, 1.0, 1.0, 0);
        }
        assert!(registry.get("worker").unwrap().is_online());

        shutdown.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_cancel_stops_the_loop() {
        let registry = Arc::new(NodeRegistry::new());
        let shutdown = CancellationToken::new();
        let handle = HeartbeatMonitor::new(registry, Duration::from_secs(3600), Duration::from_secs(30))
            .spawn(shutdown.clone());

        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("monitor did not stop")
            .unwrap();
    }
}
