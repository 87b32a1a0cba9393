//! Dockyard master - cluster membership, placement and dispatch
//!
//! The binary in `main.rs` wires these together; the library is what the
//! integration tests (and the agent's end-to-end tests) drive.

pub mod aggregate;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod http;
pub mod models;
pub mod monitor;
pub mod peer;
pub mod placement;
pub mod registry;
pub mod state;

pub use config::MasterConfig;
pub use http::build_router;
pub use models::{NodeRecord, NodeStatus};
pub use monitor::HeartbeatMonitor;
pub use registry::{NodeRegistry, SharedNodeRegistry};
pub use state::AppState;
