use crate::config::MasterConfig;
use crate::peer::{PeerClient, PeerError};
use crate::registry::{NodeRegistry, SharedNodeRegistry};
use dockyard_common::{ContainerRuntime, NodeAuthenticator};
use std::sync::Arc;

/// Everything a master handler can reach. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub registry: SharedNodeRegistry,
    pub auth: Arc<NodeAuthenticator>,
    pub peers: PeerClient,
    pub config: Arc<MasterConfig>,
    /// The master's own container runtime, listed as `local` by the aggregator.
    pub runtime: Arc<dyn ContainerRuntime>,
}

impl AppState {
    /// Fresh state with an empty registry.
    pub fn new(
        config: MasterConfig,
        auth: Arc<NodeAuthenticator>,
        runtime: Arc<dyn ContainerRuntime>,
    ) -> Result<Self, PeerError> {
        let peers = PeerClient::new(auth.clone(), config.master_id.clone(), config.peer_timeout())?;
        Ok(Self {
            registry: Arc::new(NodeRegistry::new()),
            auth,
            peers,
            config: Arc::new(config),
            runtime,
        })
    }
}
