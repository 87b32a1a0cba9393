//! Authenticated, time-bounded HTTP client the master uses to reach workers.

use crate::models::NodeRecord;
use dockyard_common::{ContainerSummary, NodeAuthenticator, WorkloadSpec, NODE_ID_HEADER, NODE_TOKEN_HEADER};
use reqwest::{Client, RequestBuilder};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum PeerError {
    #[error("failed to build http client: {0}")]
    Client(#[source] reqwest::Error),
    #[error("node {node} unreachable: {source}")]
    Transport {
        node: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("node {node} answered {status}: {body}")]
    Status { node: String, status: u16, body: String },
    #[error("node {node} sent an unreadable reply: {source}")]
    Decode {
        node: String,
        #[source]
        source: reqwest::Error,
    },
}

#[derive(Debug, Clone)]
pub struct PeerClient {
    http: Client,
    auth: Arc<NodeAuthenticator>,
    identity: String,
}

impl PeerClient {
    /// `identity` is the node id the master signs its calls with.
    pub fn new(auth: Arc<NodeAuthenticator>, identity: impl Into<String>, timeout: Duration) -> Result<Self, PeerError> {
        let http = Client::builder().timeout(timeout).build().map_err(PeerError::Client)?;
        Ok(Self {
            http,
            auth,
            identity: identity.into(),
        })
    }

    /// Asks `node` to start `spec`. The worker's JSON reply is returned untouched.
    pub async fn create_workload(&self, node: &NodeRecord, spec: &WorkloadSpec) -> Result<serde_json::Value, PeerError> {
        let request = self.http.post(node_url(&node.address, "/api/containers/create")).json(spec);
        let response = self.send(node, request).await?;

        response.json().await.map_err(|source| PeerError::Decode {
            node: node.id.clone(),
            source,
        })
    }

    pub async fn list_containers(&self, node: &NodeRecord) -> Result<Vec<ContainerSummary>, PeerError> {
        let request = self.http.get(node_url(&node.address, "/api/containers"));
        let response = self.send(node, request).await?;

        response.json().await.map_err(|source| PeerError::Decode {
            node: node.id.clone(),
            source,
        })
    }

    async fn send(&self, node: &NodeRecord, request: RequestBuilder) -> Result<reqwest::Response, PeerError> {
        let response = request
            .header(NODE_ID_HEADER, &self.identity)
            .header(NODE_TOKEN_HEADER, self.auth.mint(&self.identity))
            .send()
            .await
            .map_err(|source| PeerError::Transport {
                node: node.id.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PeerError::Status {
                node: node.id.clone(),
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }
}

/// Node addresses are stored as `host:port`; a full URL is accepted as well.
fn node_url(address: &str, path: &str) -> String {
    let base = address.trim_end_matches('/');
    if base.starts_with("http://") || base.starts_with("https://") {
        format!("{}{}", base, path)
    } else {
        format!("http://{}{}", base, path)
    }
}
