//! Plain master-replica replication with an explicit replica list

use super::replicas::ReplicatedStore;
use super::TopologyMode;
use crate::core::{Dialer, Endpoint, TopologyConnector};
use crate::error::TopologyResult;
use crate::health::HealthChecker;
use async_trait::async_trait;
use rand::rngs::StdRng;

/// Writes go to the configured master, reads to the first reachable replica
pub struct MasterReplicaConnector {
    store: ReplicatedStore,
}

impl MasterReplicaConnector {
    pub async fn connect(dialer: &dyn Dialer, master: &Endpoint, replicas: &[Endpoint], rng: StdRng) -> TopologyResult<Self> {
        let store = ReplicatedStore::connect(dialer, master, replicas, rng).await?;
        Ok(Self { store })
    }

    pub fn replica_count(&self) -> usize {
        self.store.replicas().len()
    }
}

#[async_trait]
impl TopologyConnector for MasterReplicaConnector {
    fn mode(&self) -> TopologyMode {
        TopologyMode::MasterReplica
    }

    fn master_endpoint(&self) -> &str {
        self.store.master_endpoint()
    }

    fn replica_endpoint(&self) -> &str {
        self.store.replica_endpoint()
    }

    async fn read(&self, key: &str) -> TopologyResult<Option<String>> {
        self.store.read(key).await
    }

    async fn write(&self, key: &str, value: &str) -> TopologyResult<bool> {
        self.store.write(key, value).await
    }

    async fn random_replica_read(&self, key: &str) -> TopologyResult<Option<String>> {
        self.store.random_replica_read(key).await
    }

    fn health_checkers(&self) -> Vec<Box<dyn HealthChecker>> {
        self.store.health_checkers()
    }

    async fn close(&self) {
        self.store.close().await;
    }
}
