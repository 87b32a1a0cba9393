use dockyard_common::VerifyPolicy;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tokio::fs;
use tracing::{info, warn};

pub const CONFIG_PATH_ENV: &str = "DOCKYARD_MASTER_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "master.yaml";

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct MasterConfig {
    pub listen: String,
    /// Node id the master signs its calls to workers with.
    pub master_id: String,
    pub master_name: Option<String>,
    /// Required on operator routes as `x-api-key`. Unset means those routes are closed.
    pub operator_api_key: Option<String>,
    pub monitor: MonitorConf,
    pub peer_timeout_ms: u64,
    /// Whether `/api/containers/all` also lists the master's own containers.
    pub include_local: bool,
    pub auth: AuthConf,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct MonitorConf {
    pub sweep_interval_secs: u64,
    pub node_timeout_secs: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AuthConf {
    pub verify: VerifyPolicy,
}

impl Default for MasterConfig {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:9999".into(),
            master_id: "master".into(),
            master_name: None,
            operator_api_key: None,
            monitor: MonitorConf::default(),
            peer_timeout_ms: 5000,
            include_local: true,
            auth: AuthConf::default(),
        }
    }
}

impl Default for MonitorConf {
    fn default() -> Self {
        Self {
            sweep_interval_secs: 10,
            node_timeout_secs: 30,
        }
    }
}

impl MasterConfig {
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.monitor.sweep_interval_secs.max(1))
    }

    pub fn node_timeout(&self) -> Duration {
        Duration::from_secs(self.monitor.node_timeout_secs)
    }

    pub fn peer_timeout(&self) -> Duration {
        Duration::from_millis(self.peer_timeout_ms)
    }

    /// Parses YAML; blank input gives the defaults.
    pub fn from_yaml_str(txt: &str) -> Result<Self, serde_yaml::Error> {
        if txt.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(txt)
    }

    /// Applies `DOCKYARD_LISTEN`, `DOCKYARD_API_KEY` and `DOCKYARD_MASTER_ID` on top of the file.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(listen) = lookup("DOCKYARD_LISTEN") {
            self.listen = listen;
        }
        if let Some(key) = lookup("DOCKYARD_API_KEY") {
            self.operator_api_key = Some(key);
        }
        if let Some(id) = lookup("DOCKYARD_MASTER_ID") {
            self.master_id = id;
        }
    }
}

/// Reads the YAML file named by `DOCKYARD_MASTER_CONFIG` (default `master.yaml`), then
/// the env overrides. A missing or invalid file falls back to the defaults.
pub async fn load_config() -> MasterConfig {
    let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.into());
    let mut cfg = load_file(&path).await;
    cfg.apply_env_overrides(|key| std::env::var(key).ok());
    cfg
}

async fn load_file(path: &str) -> MasterConfig {
    if !Path::new(path).exists() {
        info!("no {} found, using default master config", path);
        return MasterConfig::default();
    }

    let txt = fs::read_to_string(path).await.unwrap_or_default();
    MasterConfig::from_yaml_str(&txt).unwrap_or_else(|e| {
        warn!("invalid master config {}: {}, using defaults", path, e);
        MasterConfig::default()
    })
}
