pub mod config;
pub mod error;
/// Topocache - one read/write cache interface over whichever Redis topology is deployed
///
/// Supported topologies:
/// 1. MasterReplica: explicit master and replica list
/// 2. Sentinel: master discovered through a sentinel quorum
/// 3. Cluster: slot-routed sharded cluster, with a bulk fill operation
/// 4. Consensus: RedisRaft nodes, no role split
pub mod core;
pub mod health;
pub mod modes;
pub mod utils;

pub use crate::config::{Config, RedisConfig};
pub use crate::core::{Dialer, Endpoint, FillReport, RedisDialer, TopologyConnector};
pub use crate::error::{TopologyError, TopologyResult};
pub use crate::modes::{Connector, ConnectorFactory, TopologyMode};

use std::sync::Arc;

/// Build the connector described by `config` using real `redis` connections
pub async fn connect(config: &RedisConfig) -> TopologyResult<Connector> {
    let dialer = RedisDialer::new(config.connect_timeout());
    ConnectorFactory::new(Arc::new(dialer)).from_config(config).await
}
