//! Resource sampling for heartbeats
//!
//! Three gauges, all percentages clamped to `[0, 100]`:
//! - CPU: global usage between two refreshes 200 ms apart
//! - Memory: `(total - available) / total`
//! - Disk: the filesystem mounted at `/`, or the first disk when there is none

use serde::Serialize;
use std::path::Path;
use sysinfo::{Disks, System};
use tracing::debug;

/// Latest load of this node, as sent in a heartbeat.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ResourceSample {
    pub cpu: f64,
    pub memory: f64,
    pub disk: f64,
}

impl ResourceSample {
    pub async fn collect() -> Self {
        debug!("Collecting resource sample...");

        let mut sys = System::new();
        sys.refresh_cpu_usage();

        // Wait a moment for accurate CPU readings
        tokio::time::sleep(tokio::time::Duration::from_millis(200)).await;
        sys.refresh_cpu_usage();
        sys.refresh_memory();

        let cpu = clamp_percent(sys.global_cpu_info().cpu_usage() as f64);
        let memory = percent(sys.total_memory().saturating_sub(sys.available_memory()), sys.total_memory());

        let disks = Disks::new_with_refreshed_list();
        let volumes: Vec<(&Path, u64, u64)> = disks
            .list()
            .iter()
            .map(|d| (d.mount_point(), d.total_space(), d.available_space()))
            .collect();
        let disk = root_disk(&volumes)
            .map(|(_, total, available)| percent(total.saturating_sub(available), total))
            .unwrap_or(0.0);

        let sample = Self { cpu, memory, disk };
        debug!("Resource sample: {:?}", sample);
        sample
    }
}

fn root_disk<'a>(volumes: &[(&'a Path, u64, u64)]) -> Option<(&'a Path, u64, u64)> {
    volumes
        .iter()
        .find(|(mount, _, _)| *mount == Path::new("/"))
        .or_else(|| volumes.first())
        .copied()
}

fn percent(used: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    clamp_percent(used as f64 / total as f64 * 100.0)
}

fn clamp_percent(value: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, 100.0)
}
