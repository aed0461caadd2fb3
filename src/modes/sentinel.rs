//! Sentinel-guarded replication: the master is whatever the sentinels say it is

use super::replicas::ReplicatedStore;
use super::TopologyMode;
use crate::core::{Dialer, Endpoint, TopologyConnector};
use crate::error::{TopologyError, TopologyResult};
use crate::health::HealthChecker;
use async_trait::async_trait;
use futures::future::join_all;
use rand::rngs::StdRng;
use std::sync::Arc;
use tracing::{info, warn};

/// Result of asking the sentinels again after construction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MasterDiscovery {
    /// Master this connector is bound to
    pub bound: Endpoint,
    /// Master the sentinels advertise now
    pub advertised: Endpoint,
}

impl MasterDiscovery {
    /// Whether a failover happened since the connector was built
    pub fn changed(&self) -> bool {
        self.bound != self.advertised
    }
}

pub struct SentinelConnector {
    dialer: Arc<dyn Dialer>,
    master_name: String,
    sentinels: Vec<Endpoint>,
    store: ReplicatedStore,
}

impl SentinelConnector {
    /// Resolve the master through the sentinels, connect to it, and use every
    /// other configured node as a replica
    pub async fn connect(
        dialer: Arc<dyn Dialer>,
        master_name: &str,
        sentinels: &[Endpoint],
        nodes: &[Endpoint],
        rng: StdRng,
    ) -> TopologyResult<Self> {
        let master = resolve_master(dialer.as_ref(), sentinels, master_name).await?;
        info!("Sentinels elected {} as master of '{}'", master, master_name);

        let replicas: Vec<Endpoint> = nodes.iter().filter(|node| **node != master).cloned().collect();
        let store = ReplicatedStore::connect(dialer.as_ref(), &master, &replicas, rng).await?;

        Ok(Self {
            dialer,
            master_name: master_name.to_string(),
            sentinels: sentinels.to_vec(),
            store,
        })
    }

    pub fn master_name(&self) -> &str {
        &self.master_name
    }

    /// Ask the sentinels again without rebinding the connector
    pub async fn rediscover_master(&self) -> TopologyResult<MasterDiscovery> {
        let advertised = resolve_master(self.dialer.as_ref(), &self.sentinels, &self.master_name).await?;
        let discovery = MasterDiscovery {
            bound: self.store.master().clone(),
            advertised,
        };
        if discovery.changed() {
            warn!(
                "Master of '{}' moved from {} to {}; restart to follow it",
                self.master_name, discovery.bound, discovery.advertised
            );
        }
        Ok(discovery)
    }
}

/// Query every sentinel and take the most reported address.
///
/// Ties go to the answer of the earliest configured sentinel.
async fn resolve_master(dialer: &dyn Dialer, sentinels: &[Endpoint], master_name: &str) -> TopologyResult<Endpoint> {
    let replies = join_all(sentinels.iter().map(|sentinel| dialer.sentinel_master(sentinel, master_name))).await;

    let mut votes: Vec<(Endpoint, usize)> = Vec::new();
    let mut reachable = 0;
    for (sentinel, reply) in sentinels.iter().zip(replies) {
        match reply {
            Ok(Some(master)) => {
                reachable += 1;
                match votes.iter_mut().find(|(candidate, _)| *candidate == master) {
                    Some((_, count)) => *count += 1,
                    None => votes.push((master, 1)),
                }
            }
            Ok(None) => {
                reachable += 1;
                warn!("Sentinel {} does not know master '{}'", sentinel, master_name);
            }
            Err(e) => warn!("Sentinel {} unreachable: {}", sentinel, e),
        }
    }

    if votes.len() > 1 {
        let summary: Vec<String> = votes.iter().map(|(master, count)| format!("{master} x{count}")).collect();
        warn!("Sentinels disagree on master of '{}': {}", master_name, summary.join(", "));
    }

    let mut best: Option<(Endpoint, usize)> = None;
    for (master, count) in votes {
        if best.as_ref().map_or(true, |(_, top)| count > *top) {
            best = Some((master, count));
        }
    }

    match best {
        Some((master, _)) => Ok(master),
        None if reachable == 0 => Err(TopologyError::connection(format!(
            "none of {} sentinels reachable",
            sentinels.len()
        ))),
        None => Err(TopologyError::connection(format!(
            "no sentinel knows master '{}'",
            master_name
        ))),
    }
}

#[async_trait]
impl TopologyConnector for SentinelConnector {
    fn mode(&self) -> TopologyMode {
        TopologyMode::Sentinel
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::mock::{endpoint, MemoryDialer, MemoryNode};
    use rand::SeedableRng;

    const SENTINELS: [&str; 3] = ["10.0.1.1:26379", "10.0.1.2:26379", "10.0.1.3:26379"];
    const NODES: [&str; 3] = ["10.0.0.1:6379", "10.0.0.2:6379", "10.0.0.3:6379"];

    fn nodes() -> (Arc<MemoryNode>, Arc<MemoryNode>, Arc<MemoryNode>) {
        (MemoryNode::new(NODES[0]), MemoryNode::new(NODES[1]), MemoryNode::new(NODES[2]))
    }

    fn endpoints(addrs: &[&str]) -> Vec<Endpoint> {
        addrs.iter().map(|addr| endpoint(addr)).collect()
    }

    async fn connect(dialer: Arc<MemoryDialer>, master_name: &str) -> TopologyResult<SentinelConnector> {
        SentinelConnector::connect(
            dialer,
            master_name,
            &endpoints(&SENTINELS),
            &endpoints(&NODES),
            StdRng::seed_from_u64(5),
        )
        .await
    }

    #[tokio::test]
    async fn test_sentinels_elect_master_and_rest_are_replicas() {
        let (a, b, c) = nodes();
        let dialer = Arc::new(
            MemoryDialer::new()
                .with_node(&a)
                .with_node(&b)
                .with_node(&c)
                .with_sentinel(SENTINELS[0], Some(NODES[0]))
                .with_sentinel(SENTINELS[1], Some(NODES[0]))
                .with_sentinel(SENTINELS[2], Some(NODES[0])),
        );

        let connector = connect(Arc::clone(&dialer), "mymaster").await.unwrap();
        assert_eq!(dialer.sentinel_queries(), 3);
        assert_eq!(connector.mode(), TopologyMode::Sentinel);
        assert_eq!(connector.master_endpoint(), NODES[0]);
        assert_eq!(connector.replica_endpoint(), NODES[1]);
        assert_eq!(connector.health_checkers().len(), 3);

        assert!(connector.write("k", "v").await.unwrap());
        assert_eq!(a.value("k"), Some("v".to_string()));

        c.insert("only-c", "x");
        assert_eq!(connector.random_replica_read("only-c").await.unwrap(), Some("x".to_string()));
    }

    #[tokio::test]
    async fn test_majority_wins_over_first_sentinel() {
        let (a, b, c) = nodes();
        let dialer = Arc::new(
            MemoryDialer::new()
                .with_node(&a)
                .with_node(&b)
                .with_node(&c)
                .with_sentinel(SENTINELS[0], Some(NODES[0]))
                .with_sentinel(SENTINELS[1], Some(NODES[1]))
                .with_sentinel(SENTINELS[2], Some(NODES[1])),
        );

        let connector = connect(dialer, "mymaster").await.unwrap();
        assert_eq!(connector.master_endpoint(), NODES[1]);
        assert_eq!(connector.replica_endpoint(), NODES[0]);
    }

    #[tokio::test]
    async fn test_tie_goes_to_earliest_sentinel() {
        let (a, b, c) = nodes();
        let dialer = Arc::new(
            MemoryDialer::new()
                .with_node(&a)
                .with_node(&b)
                .with_node(&c)
                .with_sentinel(SENTINELS[1], Some(NODES[2]))
                .with_sentinel(SENTINELS[2], Some(NODES[0])),
        );

        let connector = connect(dialer, "mymaster").await.unwrap();
        assert_eq!(connector.master_endpoint(), NODES[2]);
    }

    #[tokio::test]
    async fn test_no_sentinel_reachable_fails() {
        let (a, b, c) = nodes();
        let dialer = Arc::new(MemoryDialer::new().with_node(&a).with_node(&b).with_node(&c));

        match connect(dialer, "mymaster").await {
            Err(TopologyError::Connection { message }) => assert!(message.contains("sentinels reachable")),
            Err(e) => panic!("unexpected error: {e}"),
            Ok(_) => panic!("expected connection error"),
        }
    }

    #[tokio::test]
    async fn test_unknown_service_fails() {
        let (a, b, c) = nodes();
        let dialer = Arc::new(
            MemoryDialer::new()
                .with_node(&a)
                .with_node(&b)
                .with_node(&c)
                .with_sentinel(SENTINELS[0], Some(NODES[0])),
        );

        match connect(dialer, "othermaster").await {
            Err(TopologyError::Connection { message }) => assert!(message.contains("othermaster")),
            Err(e) => panic!("unexpected error: {e}"),
            Ok(_) => panic!("expected connection error"),
        }
    }

    #[tokio::test]
    async fn test_rediscover_reports_drift_without_rebinding() {
        let (a, b, c) = nodes();
        let before = Arc::new(
            MemoryDialer::new()
                .with_node(&a)
                .with_node(&b)
                .with_node(&c)
                .with_sentinel(SENTINELS[0], Some(NODES[0])),
        );
        let connector = connect(before, "mymaster").await.unwrap();

        let discovery = connector.rediscover_master().await.unwrap();
        assert!(!discovery.changed());
        assert_eq!(discovery.advertised, endpoint(NODES[0]));

        // Same connections, sentinels now pointing elsewhere
        let after: Arc<dyn Dialer> = Arc::new(
            MemoryDialer::new()
                .with_node(&a)
                .with_node(&b)
                .with_node(&c)
                .with_sentinel(SENTINELS[0], Some(NODES[1])),
        );
        let moved = SentinelConnector { dialer: after, ..connector };

        let discovery = moved.rediscover_master().await.unwrap();
        assert!(discovery.changed());
        assert_eq!(discovery.bound, endpoint(NODES[0]));
        assert_eq!(discovery.advertised, endpoint(NODES[1]));
        assert_eq!(moved.master_endpoint(), NODES[0]);
    }
}
