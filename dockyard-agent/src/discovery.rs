//! Node identity discovery
//!
//! This module handles:
//! - Node id generation (`<hostname>-<port>`, stable across restarts)
//! - Display name (configured or hostname)
//! - The address the master should dial, from config or the first usable IPv4

use crate::config::AgentConfig;
use if_addrs::{get_if_addrs, IfAddr};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use tracing::{debug, info, warn};

/// How this node presents itself to the master.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeIdentity {
    pub id: String,
    pub name: String,
    /// `host:port`
    pub address: String,
}

impl NodeIdentity {
    pub fn discover(config: &AgentConfig) -> Self {
        let hostname = gethostname::gethostname().to_string_lossy().to_string();

        let address = match &config.advertise_address {
            Some(addr) => with_port(addr, config.port),
            None => match primary_ipv4() {
                Some(ip) => format!("{}:{}", ip, config.port),
                None => {
                    warn!("No usable IPv4 interface found, advertising localhost");
                    format!("localhost:{}", config.port)
                }
            },
        };

        let identity = Self::from_parts(&hostname, config.node_name.as_deref(), address, config.port);
        info!("Node identity - ID: {}, Name: {}, Address: {}", identity.id, identity.name, identity.address);
        identity
    }

    fn from_parts(hostname: &str, node_name: Option<&str>, address: String, port: u16) -> Self {
        Self {
            id: format!("{}-{}", hostname, port),
            name: node_name.unwrap_or(hostname).to_string(),
            address,
        }
    }
}

/// Appends `port` unless `addr` already carries one. Bare IPv6 addresses are bracketed.
fn with_port(addr: &str, port: u16) -> String {
    if addr.parse::<SocketAddr>().is_ok() {
        return addr.to_string();
    }
    if let Ok(ip) = addr.trim_start_matches('[').trim_end_matches(']').parse::<IpAddr>() {
        return SocketAddr::new(ip, port).to_string();
    }
    // hostname, possibly with a port
    match addr.rsplit_once(':') {
        Some((_, p)) if p.parse::<u16>().is_ok() => addr.to_string(),
        _ => format!("{}:{}", addr, port),
    }
}

fn primary_ipv4() -> Option<Ipv4Addr> {
    let addrs = match get_if_addrs() {
        Ok(addrs) => addrs,
        Err(e) => {
            warn!("Failed to enumerate network interfaces: {}", e);
            return None;
        }
    };

    let candidates: Vec<Ipv4Addr> = addrs
        .into_iter()
        .filter(|a| !a.is_loopback())
        .filter_map(|a| match a.addr {
            IfAddr::V4(v4) => {
                debug!("Found interface: {} ({})", a.name, v4.ip);
                Some(v4.ip)
            }
            IfAddr::V6(_) => None,
        })
        .collect();

    pick_address(&candidates)
}

/// First non-loopback address, skipping the default docker bridge (`172.17.0.0/16`)
/// while anything else is available.
fn pick_address(candidates: &[Ipv4Addr]) -> Option<Ipv4Addr> {
    let usable = candidates.iter().filter(|ip| !ip.is_loopback());
    let mut fallback = None;

    for ip in usable {
        if is_docker_bridge(ip) {
            fallback.get_or_insert(*ip);
            continue;
        }
        return Some(*ip);
    }
    fallback
}

fn is_docker_bridge(ip: &Ipv4Addr) -> bool {
    let [a, b, ..] = ip.octets();
    a == 172 && b == 17
}
