//! Sharded cluster topology
//!
//! Slot routing is left to the cluster client; this connector only decides
//! whether a call goes to a slot's master or may be served by a replica.

pub mod slots;

pub use slots::{SlotCoverage, SlotMap, SlotParseError, SlotRange};

use super::TopologyMode;
use crate::core::connector::{settle_read, settle_write};
use crate::core::{ClusterClient, Dialer, Endpoint, FillReport, ReadPreference, TopologyConnector};
use crate::error::{StoreError, TopologyError, TopologyResult};
use crate::health::{ClusterHealthChecker, HealthChecker};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Key and value of the marker written after a bulk fill
pub const FILL_FINAL_KEY: &str = "FillClusterFinal";

pub struct ClusterConnector {
    cluster: Arc<dyn ClusterClient>,
    nodes: Vec<Endpoint>,
    master_endpoint: String,
    replica_endpoint: String,
}

impl ClusterConnector {
    pub async fn connect(dialer: &dyn Dialer, nodes: &[Endpoint]) -> TopologyResult<Self> {
        let first = nodes
            .first()
            .ok_or_else(|| TopologyError::connection("no cluster nodes configured"))?;

        let cluster = dialer
            .cluster(nodes)
            .await
            .map_err(|e| TopologyError::connection(format!("cluster: {}", e)))?;
        info!("Connected to cluster through {} seed nodes", nodes.len());

        Ok(Self {
            cluster,
            nodes: nodes.to_vec(),
            master_endpoint: format!("cluster:{}", first),
            replica_endpoint: format!("cluster:{}-nodes", nodes.len()),
        })
    }

    pub fn nodes(&self) -> &[Endpoint] {
        &self.nodes
    }

    /// Slot a key hashes to, honouring `{hash tags}`
    pub fn key_slot(key: &str) -> u16 {
        crate::utils::key_slot(key)
    }

    /// Current slot ownership as reported by the cluster
    pub async fn topology(&self) -> TopologyResult<SlotMap> {
        let output = self.cluster.cluster_nodes().await?;
        let map = SlotMap::from_cluster_nodes(&output)
            .map_err(|e| StoreError::rejected("cluster", e.to_string()))?;

        let coverage = map.coverage();
        if map.is_complete() {
            debug!("Cluster slots fully covered by {} masters", map.masters().len());
        } else {
            warn!(
                "Cluster slot coverage incomplete: {}/{} ({:.1}%)",
                coverage.assigned_slots, coverage.total_slots, coverage.coverage_percentage
            );
        }
        Ok(map)
    }
}

#[async_trait]
impl TopologyConnector for ClusterConnector {
    fn mode(&self) -> TopologyMode {
        TopologyMode::Cluster
    }

    fn master_endpoint(&self) -> &str {
        &self.master_endpoint
    }

    fn replica_endpoint(&self) -> &str {
        &self.replica_endpoint
    }

    async fn read(&self, key: &str) -> TopologyResult<Option<String>> {
        debug!("Reading '{}' from slot {}", key, Self::key_slot(key));
        settle_read(key, self.cluster.get(key, ReadPreference::PreferReplica).await)
    }

    async fn write(&self, key: &str, value: &str) -> TopologyResult<bool> {
        debug!("Writing '{}' to slot {}", key, Self::key_slot(key));
        settle_write(key, self.cluster.set(key, value).await)
    }

    async fn random_replica_read(&self, key: &str) -> TopologyResult<Option<String>> {
        // Any replica of the owning slot may serve it
        self.read(key).await
    }

    async fn fill_cluster(&self, count: usize, shutdown: &watch::Receiver<bool>) -> TopologyResult<FillReport> {
        info!("Filling cluster with {} keys", count);
        let mut report = FillReport::default();
        let mut slots = HashSet::new();
        let progress_step = (count / 10).max(1);

        for i in 0..count {
            if *shutdown.borrow() {
                warn!("Cluster fill cancelled after {} of {} keys", report.attempted, count);
                report.cancelled = true;
                report.distinct_slots = slots.len();
                return Ok(report);
            }

            let key = format!("{i}:test:key:{i}:{}", Uuid::new_v4().simple());
            let value = format!("test:value:{i}");
            report.attempted += 1;

            match self.cluster.set(&key, &value).await {
                Ok(true) => {
                    report.written += 1;
                    slots.insert(Self::key_slot(&key));
                }
                Ok(false) => {
                    warn!("Write of '{}' not acknowledged, skipping", key);
                    report.skipped += 1;
                }
                Err(e) => {
                    warn!("Write of '{}' failed, skipping: {}", key, e);
                    report.skipped += 1;
                }
            }

            if (i + 1) % progress_step == 0 {
                debug!("Cluster fill progress: {}/{}", i + 1, count);
            }
        }

        report.distinct_slots = slots.len();
        if *shutdown.borrow() {
            warn!("Cluster fill cancelled before the final marker");
            report.cancelled = true;
            return Ok(report);
        }

        report.success = match self.cluster.set(FILL_FINAL_KEY, FILL_FINAL_KEY).await {
            Ok(written) => written,
            Err(e) => {
                warn!("Final marker write failed: {}", e);
                false
            }
        };

        info!(
            "Cluster fill done: {} written, {} skipped across {} slots (success: {})",
            report.written, report.skipped, report.distinct_slots, report.success
        );
        Ok(report)
    }

    fn health_checkers(&self) -> Vec<Box<dyn HealthChecker>> {
        vec![Box::new(ClusterHealthChecker::new(
            self.master_endpoint.clone(),
            Arc::clone(&self.cluster),
        ))]
    }

    async fn close(&self) {
        self.cluster.close().await;
        info!("Closed cluster connection");
    }
}
