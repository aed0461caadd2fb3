/// Store topologies and the factory that picks one at startup
pub mod cluster;
pub mod consensus;
pub mod master_replica;
pub mod replicas;
pub mod sentinel;

pub use cluster::ClusterConnector;
pub use consensus::ConsensusConnector;
pub use master_replica::MasterReplicaConnector;
pub use sentinel::{MasterDiscovery, SentinelConnector};

use crate::config::RedisConfig;
use crate::core::{Dialer, Endpoint, FillReport, TopologyConnector};
use crate::error::{TopologyError, TopologyResult};
use crate::health::HealthChecker;
use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;

/// How the store is deployed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TopologyMode {
    MasterReplica,
    Sentinel,
    Cluster,
    Consensus,
}

impl TopologyMode {
    pub const ALL: [TopologyMode; 4] = [
        TopologyMode::MasterReplica,
        TopologyMode::Sentinel,
        TopologyMode::Cluster,
        TopologyMode::Consensus,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            TopologyMode::MasterReplica => "MasterReplica",
            TopologyMode::Sentinel => "Sentinel",
            TopologyMode::Cluster => "Cluster",
            TopologyMode::Consensus => "Consensus",
        }
    }

    /// Name used by older deployments
    fn legacy_name(&self) -> &'static str {
        match self {
            TopologyMode::MasterReplica => "RedisMasterSlaves",
            TopologyMode::Sentinel => "RedisSentinel",
            TopologyMode::Cluster => "RedisCluster",
            TopologyMode::Consensus => "RedisRaft",
        }
    }
}

impl FromStr for TopologyMode {
    type Err = TopologyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|mode| wanted.eq_ignore_ascii_case(mode.name()) || wanted.eq_ignore_ascii_case(mode.legacy_name()))
            .ok_or_else(|| TopologyError::UnsupportedMode(s.to_string()))
    }
}

impl fmt::Display for TopologyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The one connector a process runs with
pub enum Connector {
    MasterReplica(MasterReplicaConnector),
    Sentinel(SentinelConnector),
    Cluster(ClusterConnector),
    Consensus(ConsensusConnector),
}

impl Connector {
    fn inner(&self) -> &dyn TopologyConnector {
        match self {
            Connector::MasterReplica(c) => c,
            Connector::Sentinel(c) => c,
            Connector::Cluster(c) => c,
            Connector::Consensus(c) => c,
        }
    }
}

#[async_trait]
impl TopologyConnector for Connector {
    fn mode(&self) -> TopologyMode {
        self.inner().mode()
    }

    fn master_endpoint(&self) -> &str {
        self.inner().master_endpoint()
    }

    fn replica_endpoint(&self) -> &str {
        self.inner().replica_endpoint()
    }

    async fn read(&self, key: &str) -> TopologyResult<Option<String>> {
        self.inner().read(key).await
    }

    async fn write(&self, key: &str, value: &str) -> TopologyResult<bool> {
        self.inner().write(key, value).await
    }

    async fn random_replica_read(&self, key: &str) -> TopologyResult<Option<String>> {
        self.inner().random_replica_read(key).await
    }

    async fn fill_cluster(&self, count: usize, shutdown: &watch::Receiver<bool>) -> TopologyResult<FillReport> {
        self.inner().fill_cluster(count, shutdown).await
    }

    fn health_checkers(&self) -> Vec<Box<dyn HealthChecker>> {
        self.inner().health_checkers()
    }

    async fn close(&self) {
        self.inner().close().await
    }
}

/// Builds the connector for the configured mode
pub struct ConnectorFactory {
    dialer: Arc<dyn Dialer>,
    seed: Option<u64>,
}

impl ConnectorFactory {
    pub fn new(dialer: Arc<dyn Dialer>) -> Self {
        Self { dialer, seed: None }
    }

    /// Fix the random source of the built connector
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    fn rng(&self) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }

    /// Build using `config.mode`
    pub async fn from_config(&self, config: &RedisConfig) -> TopologyResult<Connector> {
        self.select(&config.mode, config).await
    }

    /// Parse `mode` and build the matching connector. Nothing is dialled when
    /// the mode is unknown or an address is malformed.
    pub async fn select(&self, mode: &str, config: &RedisConfig) -> TopologyResult<Connector> {
        let mode: TopologyMode = mode.parse()?;
        info!("Building {} connector", mode);

        let connector = match mode {
            TopologyMode::MasterReplica => {
                let section = &config.master_replica;
                let master = Endpoint::parse(&section.master)?;
                let replicas = Endpoint::parse_all(&section.replicas)?;
                Connector::MasterReplica(
                    MasterReplicaConnector::connect(self.dialer.as_ref(), &master, &replicas, self.rng()).await?,
                )
            }
            TopologyMode::Sentinel => {
                let section = &config.sentinel;
                let sentinels = Endpoint::parse_all(&section.sentinels)?;
                let nodes = Endpoint::parse_all(&section.nodes)?;
                Connector::Sentinel(
                    SentinelConnector::connect(
                        Arc::clone(&self.dialer),
                        &section.master_name,
                        &sentinels,
                        &nodes,
                        self.rng(),
                    )
                    .await?,
                )
            }
            TopologyMode::Cluster => {
                let nodes = Endpoint::parse_all(&config.cluster.nodes)?;
                Connector::Cluster(ClusterConnector::connect(self.dialer.as_ref(), &nodes).await?)
            }
            TopologyMode::Consensus => {
                let nodes = Endpoint::parse_all(&config.consensus.nodes)?;
                Connector::Consensus(ConsensusConnector::connect(self.dialer.as_ref(), &nodes).await?)
            }
        };

        info!(
            "{} connector ready (master: {}, replica: {})",
            mode,
            connector.master_endpoint(),
            connector.replica_endpoint()
        );
        Ok(connector)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ClusterConfig, ConsensusConfig, MasterReplicaConfig, SentinelConfig};
    use crate::core::mock::{MemoryCluster, MemoryDialer, MemoryNode};

    fn config() -> RedisConfig {
        RedisConfig {
            master_replica: MasterReplicaConfig {
                master: "10.0.0.1:6379".to_string(),
                replicas: vec!["10.0.0.2:6379".to_string(), "10.0.0.3:6379".to_string()],
            },
            sentinel: SentinelConfig {
                master_name: "mymaster".to_string(),
                sentinels: vec!["10.0.1.1:26379".to_string()],
                nodes: vec![
                    "10.0.0.1:6379".to_string(),
                    "10.0.0.2:6379".to_string(),
                    "10.0.0.3:6379".to_string(),
                ],
            },
            cluster: ClusterConfig {
                nodes: vec!["10.0.2.1:7000".to_string(), "10.0.2.2:7000".to_string()],
                fill_count: 10,
            },
            consensus: ConsensusConfig {
                nodes: vec!["10.0.0.1:6379".to_string()],
            },
            ..RedisConfig::default()
        }
    }

    fn factory() -> ConnectorFactory {
        let a = MemoryNode::new("10.0.0.1:6379");
        let b = MemoryNode::new("10.0.0.2:6379");
        let c = MemoryNode::new("10.0.0.3:6379");
        let dialer = MemoryDialer::new()
            .with_node(&a)
            .with_node(&b)
            .with_node(&c)
            .with_sentinel("10.0.1.1:26379", Some("10.0.0.1:6379"))
            .with_cluster(&MemoryCluster::new());
        ConnectorFactory::new(Arc::new(dialer)).with_seed(42)
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!("MasterReplica".parse::<TopologyMode>().unwrap(), TopologyMode::MasterReplica);
        assert_eq!("sentinel".parse::<TopologyMode>().unwrap(), TopologyMode::Sentinel);
        assert_eq!("CLUSTER".parse::<TopologyMode>().unwrap(), TopologyMode::Cluster);
        assert_eq!(" consensus ".parse::<TopologyMode>().unwrap(), TopologyMode::Consensus);
    }

    #[test]
    fn test_legacy_mode_names() {
        assert_eq!("RedisMasterSlaves".parse::<TopologyMode>().unwrap(), TopologyMode::MasterReplica);
        assert_eq!("redissentinel".parse::<TopologyMode>().unwrap(), TopologyMode::Sentinel);
        assert_eq!("RedisCluster".parse::<TopologyMode>().unwrap(), TopologyMode::Cluster);
        assert_eq!("REDISRAFT".parse::<TopologyMode>().unwrap(), TopologyMode::Consensus);
    }

    #[test]
    fn test_mode_display_round_trips() {
        for mode in TopologyMode::ALL {
            assert_eq!(mode.to_string().parse::<TopologyMode>().unwrap(), mode);
        }
    }

    #[tokio::test]
    async fn test_every_mode_selects_its_connector() {
        let factory = factory();
        let config = config();

        for (mode, expected) in [
            ("masterreplica", TopologyMode::MasterReplica),
            ("Sentinel", TopologyMode::Sentinel),
            ("cluster", TopologyMode::Cluster),
            ("CONSENSUS", TopologyMode::Consensus),
        ] {
            let connector = factory.select(mode, &config).await.unwrap();
            assert_eq!(connector.mode(), expected);
        }

        let connector = factory.select("Cluster", &config).await.unwrap();
        assert!(matches!(connector, Connector::Cluster(_)));
        assert_eq!(connector.master_endpoint(), "cluster:10.0.2.1:7000");
    }

    #[tokio::test]
    async fn test_unknown_mode_builds_nothing() {
        let dialer = Arc::new(MemoryDialer::new().with_sentinel("10.0.1.1:26379", Some("10.0.0.1:6379")));
        let factory = ConnectorFactory::new(dialer.clone());

        match factory.select("Foo", &config()).await {
            Err(TopologyError::UnsupportedMode(input)) => assert_eq!(input, "Foo"),
            Err(e) => panic!("unexpected error: {e}"),
            Ok(_) => panic!("expected UnsupportedMode"),
        }
        assert_eq!(dialer.sentinel_queries(), 0);
    }

    #[tokio::test]
    async fn test_malformed_endpoint_is_rejected() {
        let mut config = config();
        config.master_replica.master = "10.0.0.1".to_string();

        assert!(matches!(
            factory().select("MasterReplica", &config).await,
            Err(TopologyError::Endpoint(_))
        ));
    }

    #[tokio::test]
    async fn test_fill_is_noop_outside_cluster() {
        let factory = factory();
        let (_tx, rx) = watch::channel(false);

        let connector = factory.from_config(&config()).await.unwrap();
        assert_eq!(connector.mode(), TopologyMode::MasterReplica);
        let report = connector.fill_cluster(100, &rx).await.unwrap();
        assert_eq!(report, FillReport::not_applicable());

        let cluster = factory.select("Cluster", &config()).await.unwrap();
        let report = cluster.fill_cluster(3, &rx).await.unwrap();
        assert_eq!(report.written, 3);
        assert!(report.success);
    }
}
