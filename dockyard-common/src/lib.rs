//! Dockyard common - pieces shared by the master and the worker agent
//!
//! - Inter-node token minting and verification (HMAC-SHA256, minute-stamped)
//! - The `require_node_token` axum middleware guarding control-plane routes
//! - Wire types exchanged on the control plane
//! - The container runtime seam and its `docker` CLI adapter

pub mod auth;
pub mod guard;
pub mod runtime;
pub mod wire;

pub use auth::{keys_match, NodeAuthenticator, VerifyPolicy, NODE_ID_HEADER, NODE_TOKEN_HEADER};
pub use guard::{require_node_token, AuthenticatedNode};
pub use runtime::{ContainerRuntime, DockerCli, RuntimeError};
pub use wire::{
    ContainerSummary, CreatedWorkload, HeartbeatRequest, NodeRole, RegisterRequest, StatusReply,
    WorkloadSpec,
};
