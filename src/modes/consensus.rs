//! Consensus-replicated store (RedisRaft). Every node accepts every call and
//! the server forwards to the leader, so there is no role split.

use super::TopologyMode;
use crate::core::connector::{settle_read, settle_write};
use crate::core::{Dialer, Endpoint, NodeClient, TopologyConnector};
use crate::error::{StoreError, TopologyError, TopologyResult};
use crate::health::{HealthChecker, NodeHealthChecker};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct ConsensusConnector {
    node: Arc<dyn NodeClient>,
    master_endpoint: String,
    replica_endpoint: String,
}

impl ConsensusConnector {
    /// Connect to the first reachable node in configured order
    pub async fn connect(dialer: &dyn Dialer, nodes: &[Endpoint]) -> TopologyResult<Self> {
        for endpoint in nodes {
            match dialer.node(endpoint).await {
                Ok(node) => {
                    info!("Connected to consensus node {}", endpoint);
                    return Ok(Self {
                        node,
                        master_endpoint: format!("consensus:{}", endpoint),
                        replica_endpoint: format!("consensus:{}-nodes", nodes.len()),
                    });
                }
                Err(e) => warn!("Consensus node {} unreachable: {}", endpoint, e),
            }
        }

        Err(TopologyError::connection(format!(
            "none of {} consensus nodes reachable",
            nodes.len()
        )))
    }

    /// Connected node address
    pub fn node(&self) -> &Endpoint {
        self.node.endpoint()
    }

    /// `RAFT.INFO` from the connected node
    pub async fn raft_info(&self) -> TopologyResult<String> {
        match self.node.command_text(&["RAFT.INFO"]).await {
            Ok(info) => Ok(info),
            Err(e @ StoreError::Unavailable { .. }) => Err(TopologyError::connection(e.to_string())),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl TopologyConnector for ConsensusConnector {
    fn mode(&self) -> TopologyMode {
        TopologyMode::Consensus
    }

    fn master_endpoint(&self) -> &str {
        &self.master_endpoint
    }

    fn replica_endpoint(&self) -> &str {
        &self.replica_endpoint
    }

    async fn read(&self, key: &str) -> TopologyResult<Option<String>> {
        debug!("Reading '{}' via {}", key, self.node.endpoint());
        settle_read(key, self.node.get(key).await)
    }

    async fn write(&self, key: &str, value: &str) -> TopologyResult<bool> {
        debug!("Writing '{}' via {}", key, self.node.endpoint());
        settle_write(key, self.node.set(key, value).await)
    }

    async fn random_replica_read(&self, _key: &str) -> TopologyResult<Option<String>> {
        Err(TopologyError::not_supported(
            "random_replica_read",
            TopologyMode::Consensus.name(),
        ))
    }

    fn health_checkers(&self) -> Vec<Box<dyn HealthChecker>> {
        vec![Box::new(NodeHealthChecker::new("consensus", Arc::clone(&self.node)))]
    }

    async fn close(&self) {
        self.node.close().await;
        info!("Closed consensus node {}", self.node.endpoint());
    }
}
