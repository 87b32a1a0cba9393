//! Agent configuration
//!
//! Handles:
//! - Master endpoint and heartbeat cadence
//! - How this node advertises itself (name, port, address, labels)
//! - Token acceptance policy for calls coming from the master
//!
//! A TOML file is read first, then `MASTER_URL`, `NODE_NAME`, `HOST`, `PORT` and
//! `ADVERTISE_ADDR` override it.

use anyhow::{Context, Result};
use dockyard_common::VerifyPolicy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_PATH_ENV: &str = "DOCKYARD_AGENT_CONFIG";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Base URL of the master, e.g. `http://10.0.0.1:9999`.
    pub master_url: String,
    /// Display name; the hostname when unset.
    pub node_name: Option<String>,
    pub listen_host: String,
    pub port: u16,
    /// `host` or `host:port` the master should use to reach this node.
    pub advertise_address: Option<String>,
    pub heartbeat_interval_secs: u64,
    pub request_timeout_ms: u64,
    /// Retry a failed registration on this period until it succeeds. Off unless set.
    pub registration_retry_secs: Option<u64>,
    pub labels: HashMap<String, String>,
    pub auth: AuthConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub verify: VerifyPolicy,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            master_url: String::new(),
            node_name: None,
            listen_host: "0.0.0.0".to_string(),
            port: 10001,
            advertise_address: None,
            heartbeat_interval_secs: 5,
            request_timeout_ms: 5000,
            registration_retry_secs: None,
            labels: HashMap::new(),
            auth: AuthConfig::default(),
        }
    }
}

impl AgentConfig {
    /// Load config from `DOCKYARD_AGENT_CONFIG` or the OS config dir, then env overrides.
    pub async fn load() -> Result<Self> {
        let path = match std::env::var(CONFIG_PATH_ENV) {
            Ok(p) if !p.is_empty() => PathBuf::from(p),
            _ => Self::config_file_path()?,
        };

        let mut config = Self::load_file(&path).await?;
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Missing file means defaults; an unreadable or invalid one is an error.
    pub async fn load_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("Invalid agent config {}", path.display()))
    }

    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = lookup("MASTER_URL") {
            self.master_url = url;
        }
        if let Some(name) = lookup("NODE_NAME") {
            self.node_name = Some(name);
        }
        if let Some(host) = lookup("HOST") {
            self.listen_host = host;
        }
        if let Some(port) = lookup("PORT") {
            self.port = port.parse().with_context(|| format!("PORT is not a port number: {}", port))?;
        }
        if let Some(addr) = lookup("ADVERTISE_ADDR") {
            self.advertise_address = Some(addr);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.master_url.trim().is_empty() {
            anyhow::bail!("MASTER_URL is required (env or master_url in the config file)");
        }
        if self.heartbeat_interval_secs == 0 {
            anyhow::bail!("heartbeat_interval_secs must be at least 1");
        }
        Ok(())
    }

    /// Get OS-specific config file path
    pub fn config_file_path() -> Result<PathBuf> {
        let mut path = dirs::config_dir().ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;

        path.push("dockyard-agent");
        path.push("config.toml");
        Ok(path)
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.listen_host, self.port)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn registration_retry(&self) -> Option<Duration> {
        self.registration_retry_secs.filter(|s| *s > 0).map(Duration::from_secs)
    }
}
