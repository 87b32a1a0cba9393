//! Dockyard agent - the worker side of the cluster
//!
//! - Discovers how this node presents itself (id, name, address)
//! - Samples CPU / memory / disk load
//! - Registers with the master and heartbeats on an interval
//! - Serves the container API the master dispatches to

pub mod config;
pub mod control_plane;
pub mod discovery;
pub mod metrics;
pub mod server;

pub use config::AgentConfig;
pub use control_plane::{ClientError, ControlPlaneClient};
pub use discovery::NodeIdentity;
pub use metrics::ResourceSample;
pub use server::{build_router, WorkerState};
