//! Container runtime seam
//!
//! Nodes only need two things from the local container engine: list what runs here
//! and start a new workload. `DockerCli` drives the `docker` binary; tests plug in
//! their own implementation.

use crate::wire::{ContainerSummary, CreatedWorkload, WorkloadSpec};
use async_trait::async_trait;
use serde::Deserialize;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("failed to spawn runtime command: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("`{command}` failed: {stderr}")]
    Failed { command: String, stderr: String },
    #[error("unexpected runtime output: {0}")]
    Parse(#[from] serde_json::Error),
}

#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    async fn list(&self) -> Result<Vec<ContainerSummary>, RuntimeError>;

    async fn create(&self, spec: &WorkloadSpec) -> Result<CreatedWorkload, RuntimeError>;

    async fn count(&self) -> Result<usize, RuntimeError> {
        Ok(self.list().await?.len())
    }
}

/// Runtime backed by the local `docker` CLI.
#[derive(Debug, Clone)]
pub struct DockerCli {
    binary: String,
}

impl Default for DockerCli {
    fn default() -> Self {
        Self { binary: "docker".to_string() }
    }
}

/// One line of `docker ps --format '{{json .}}'`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct PsLine {
    #[serde(rename = "ID")]
    id: String,
    names: String,
    image: String,
    status: String,
    #[serde(default)]
    state: String,
}

impl DockerCli {
    pub fn new(binary: impl Into<String>) -> Self {
        Self { binary: binary.into() }
    }

    async fn run(&self, args: &[String]) -> Result<String, RuntimeError> {
        debug!("running {} {}", self.binary, args.join(" "));
        let output = Command::new(&self.binary)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .await?;

        if !output.status.success() {
            return Err(RuntimeError::Failed {
                command: format!("{} {}", self.binary, args.first().map(String::as_str).unwrap_or("")),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl ContainerRuntime for DockerCli {
    async fn list(&self) -> Result<Vec<ContainerSummary>, RuntimeError> {
        let args = ["ps", "-a", "--no-trunc", "--format", "{{json .}}"].map(String::from);
        let stdout = self.run(&args).await?;
        parse_ps_output(&stdout)
    }

    async fn create(&self, spec: &WorkloadSpec) -> Result<CreatedWorkload, RuntimeError> {
        let stdout = self.run(&run_args(spec)).await?;
        Ok(CreatedWorkload {
            status: "success".to_string(),
            id: stdout.trim().to_string(),
            name: spec.name.clone(),
        })
    }
}

fn parse_ps_output(stdout: &str) -> Result<Vec<ContainerSummary>, RuntimeError> {
    stdout
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            let ps: PsLine = serde_json::from_str(line)?;
            Ok(ContainerSummary {
                id: ps.id.chars().take(12).collect(),
                name: ps.names.split(',').next().unwrap_or_default().to_string(),
                image: ps.image,
                status: ps.status,
                state: ps.state,
            })
        })
        .collect()
}

/// Arguments of `docker run` for `spec`, with map entries in key order.
fn run_args(spec: &WorkloadSpec) -> Vec<String> {
    let mut args = vec!["run".to_string(), "-d".to_string()];

    if !spec.name.is_empty() {
        args.push("--name".to_string());
        args.push(spec.name.clone());
    }

    let mut ports: Vec<_> = spec.ports.iter().collect();
    ports.sort();
    for (host_port, container_port) in ports {
        // accepts both "80" and "8080:80"
        let container_port = container_port.rsplit(':').next().unwrap_or(container_port);
        args.push("-p".to_string());
        args.push(format!("{}:{}", host_port, container_port));
    }

    let mut env: Vec<_> = spec.env.iter().collect();
    env.sort();
    for (key, value) in env {
        args.push("-e".to_string());
        args.push(format!("{}={}", key, value));
    }

    let mut labels: Vec<_> = spec.labels.iter().collect();
    labels.sort();
    for (key, value) in labels {
        args.push("--label".to_string());
        args.push(format!("{}={}", key, value));
    }

    args.push(spec.image.clone());
    args
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_parse_ps_output() {
        let stdout = concat!(
            r#"{"ID":"4f2c0d1e9a7b55aa11","Names":"web,web-alias","Image":"nginx","Status":"Up 2 hours","State":"running"}"#,
            "\n\n",
            r#"{"ID":"9a7b","Names":"job","Image":"busybox","Status":"Exited (0)","State":"exited"}"#,
            "\n"
        );
        let containers = parse_ps_output(stdout).unwrap();
        assert_eq!(containers.len(), 2);
        assert_eq!(containers[0].id, "4f2c0d1e9a7b");
        assert_eq!(containers[0].name, "web");
        assert_eq!(containers[1].state, "exited");
    }

    #[test]
    fn test_parse_ps_output_rejects_garbage() {
        assert!(matches!(parse_ps_output("not json"), Err(RuntimeError::Parse(_))));
    }

    #[test]
    fn test_run_args() {
        let spec = WorkloadSpec {
            image: "nginx:alpine".to_string(),
            name: "web".to_string(),
            ports: HashMap::from([("8080".to_string(), "80".to_string()), ("8443".to_string(), "9443:443".to_string())]),
            env: HashMap::from([("MODE".to_string(), "prod".to_string())]),
            labels: HashMap::from([("team".to_string(), "infra".to_string())]),
        };
        assert_eq!(
            run_args(&spec),
            vec![
                "run", "-d", "--name", "web", "-p", "8080:80", "-p", "8443:443", "-e", "MODE=prod",
                "--label", "team=infra", "nginx:alpine",
            ]
        );
    }

    #[test]
    fn test_run_args_without_name() {
        let spec = WorkloadSpec { image: "redis".to_string(), ..Default::default() };
        assert_eq!(run_args(&spec), vec!["run", "-d", "redis"]);
    }

    #[tokio::test]
    async fn test_missing_binary_is_a_spawn_error() {
        let runtime = DockerCli::new("/nonexistent/dockyard-docker");
        assert!(matches!(runtime.list().await, Err(RuntimeError::Spawn(_))));
    }
}
