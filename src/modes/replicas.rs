//! Master plus replica set, shared by the master-replica and sentinel topologies

use crate::core::connector::{settle_read, settle_write};
use crate::core::{Dialer, Endpoint, NodeClient};
use crate::error::{TopologyError, TopologyResult};
use crate::health::{HealthChecker, NodeHealthChecker};
use futures::future::join_all;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Connected replicas in configured order
pub struct ReplicaSet {
    nodes: Vec<Arc<dyn NodeClient>>,
    rng: Mutex<StdRng>,
}

impl ReplicaSet {
    /// Dial every replica concurrently. Unreachable ones are skipped.
    pub async fn connect(dialer: &dyn Dialer, endpoints: &[Endpoint], rng: StdRng) -> Self {
        let attempts = join_all(endpoints.iter().map(|endpoint| dialer.node(endpoint))).await;

        let mut nodes = Vec::with_capacity(endpoints.len());
        for (endpoint, attempt) in endpoints.iter().zip(attempts) {
            match attempt {
                Ok(node) => nodes.push(node),
                Err(e) => warn!("Skipping replica {}: {}", endpoint, e),
            }
        }

        info!("Connected to {}/{} replicas", nodes.len(), endpoints.len());
        Self {
            nodes,
            rng: Mutex::new(rng),
        }
    }

    /// The replica plain reads go to
    pub fn designated(&self) -> Option<&Arc<dyn NodeClient>> {
        self.nodes.first()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn endpoints(&self) -> Vec<Endpoint> {
        self.nodes.iter().map(|node| node.endpoint().clone()).collect()
    }

    /// Query replicas in a fresh random order and return the first hit.
    ///
    /// Failing replicas are skipped; the call only fails when none of them
    /// answered at all.
    pub async fn random_read(&self, key: &str) -> TopologyResult<Option<String>> {
        let order = {
            let mut order: Vec<usize> = (0..self.nodes.len()).collect();
            order.shuffle(&mut *self.rng.lock());
            order
        };

        let mut answered = 0;
        for index in order {
            let node = &self.nodes[index];
            match node.get(key).await {
                Ok(Some(value)) => {
                    debug!("Random read of '{}' hit {}", key, node.endpoint());
                    return Ok(Some(value));
                }
                Ok(None) => answered += 1,
                Err(e) => warn!("Replica {} failed during random read: {}", node.endpoint(), e),
            }
        }

        if answered == 0 && !self.nodes.is_empty() {
            return Err(TopologyError::connection(format!(
                "none of {} replicas answered a read of '{}'",
                self.nodes.len(),
                key
            )));
        }
        Ok(None)
    }

    pub async fn close(&self) {
        join_all(self.nodes.iter().map(|node| node.close())).await;
    }
}

/// One writable master and its read replicas
pub struct ReplicatedStore {
    master: Arc<dyn NodeClient>,
    replicas: ReplicaSet,
    master_endpoint: String,
    replica_endpoint: String,
}

impl ReplicatedStore {
    /// Connect the master (fatal on failure), then the replicas
    pub async fn connect(dialer: &dyn Dialer, master: &Endpoint, replicas: &[Endpoint], rng: StdRng) -> TopologyResult<Self> {
        let master_node = dialer
            .node(master)
            .await
            .map_err(|e| TopologyError::connection(format!("master {}: {}", master, e)))?;
        info!("Connected to master {}", master);

        let replicas = ReplicaSet::connect(dialer, replicas, rng).await;
        let replica_endpoint = match replicas.designated() {
            Some(replica) => replica.endpoint().to_string(),
            None => {
                warn!("No replica reachable, reads go to master {}", master);
                master.to_string()
            }
        };

        Ok(Self {
            master: master_node,
            replicas,
            master_endpoint: master.to_string(),
            replica_endpoint,
        })
    }

    pub fn master_endpoint(&self) -> &str {
        &self.master_endpoint
    }

    pub fn replica_endpoint(&self) -> &str {
        &self.replica_endpoint
    }

    pub fn master(&self) -> &Endpoint {
        self.master.endpoint()
    }

    pub fn replicas(&self) -> &ReplicaSet {
        &self.replicas
    }

    fn read_target(&self) -> &Arc<dyn NodeClient> {
        self.replicas.designated().unwrap_or(&self.master)
    }

    pub async fn read(&self, key: &str) -> TopologyResult<Option<String>> {
        let target = self.read_target();
        debug!("Reading '{}' from {}", key, target.endpoint());
        settle_read(key, target.get(key).await)
    }

    pub async fn write(&self, key: &str, value: &str) -> TopologyResult<bool> {
        debug!("Writing '{}' to {}", key, self.master.endpoint());
        settle_write(key, self.master.set(key, value).await)
    }

    pub async fn random_replica_read(&self, key: &str) -> TopologyResult<Option<String>> {
        if self.replicas.is_empty() {
            return self.read(key).await;
        }
        self.replicas.random_read(key).await
    }

    pub fn health_checkers(&self) -> Vec<Box<dyn HealthChecker>> {
        let mut checkers: Vec<Box<dyn HealthChecker>> =
            vec![Box::new(NodeHealthChecker::new("master", Arc::clone(&self.master)))];
        for replica in &self.replicas.nodes {
            checkers.push(Box::new(NodeHealthChecker::new("replica", Arc::clone(replica))));
        }
        checkers
    }

    pub async fn close(&self) {
        self.master.close().await;
        self.replicas.close().await;
        info!("Closed master {} and {} replicas", self.master_endpoint, self.replicas.len());
    }
}
