//! The uniform cache interface every topology implements

use crate::error::{StoreError, StoreResult, TopologyError, TopologyResult};
use crate::health::HealthChecker;
use crate::modes::TopologyMode;
use async_trait::async_trait;
use tokio::sync::watch;
use tracing::warn;

/// Outcome of a bulk fill.
///
/// `success` is the result of the final marker write only; earlier
/// failures are counted in `skipped` and never abort the batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FillReport {
    pub attempted: usize,
    pub written: usize,
    pub skipped: usize,
    pub distinct_slots: usize,
    pub cancelled: bool,
    pub success: bool,
}

impl FillReport {
    /// Report for topologies where bulk fill has no meaning
    pub fn not_applicable() -> Self {
        Self {
            success: true,
            ..Self::default()
        }
    }
}

/// Read/write access to the store, independent of how it is deployed.
///
/// Implementations are shared between concurrent callers. A missing key is
/// `Ok(None)` and a declined write is `Ok(false)`; only a connection that is
/// gone, or an operation the topology cannot offer, is an `Err`.
#[async_trait]
pub trait TopologyConnector: Send + Sync {
    fn mode(&self) -> TopologyMode;

    /// Where writes go, for diagnostics
    fn master_endpoint(&self) -> &str;

    /// Where reads go, for diagnostics
    fn replica_endpoint(&self) -> &str;

    async fn read(&self, key: &str) -> TopologyResult<Option<String>>;

    async fn write(&self, key: &str, value: &str) -> TopologyResult<bool>;

    /// Read from the replicas in a fresh random order, returning the first hit
    async fn random_replica_read(&self, key: &str) -> TopologyResult<Option<String>>;

    /// Populate the store with `count` synthetic keys. Only meaningful for
    /// a sharded cluster; other topologies report success without writing.
    async fn fill_cluster(&self, _count: usize, _shutdown: &watch::Receiver<bool>) -> TopologyResult<FillReport> {
        Ok(FillReport::not_applicable())
    }

    /// One checker per live connection
    fn health_checkers(&self) -> Vec<Box<dyn HealthChecker>>;

    /// Release every underlying connection
    async fn close(&self);
}

/// Turn a node read into the connector contract: refusals become a miss,
/// a dead connection stays an error
pub(crate) fn settle_read(key: &str, result: StoreResult<Option<String>>) -> TopologyResult<Option<String>> {
    match result {
        Ok(value) => Ok(value),
        Err(e @ StoreError::Unavailable { .. }) => Err(TopologyError::connection(e.to_string())),
        Err(e) => {
            warn!("Read of '{}' refused: {}", key, e);
            Ok(None)
        }
    }
}

/// Same as [`settle_read`] for writes: refusals become `false`
pub(crate) fn settle_write(key: &str, result: StoreResult<bool>) -> TopologyResult<bool> {
    match result {
        Ok(written) => Ok(written),
        Err(e @ StoreError::Unavailable { .. }) => Err(TopologyError::connection(e.to_string())),
        Err(e) => {
            warn!("Write of '{}' declined: {}", key, e);
            Ok(false)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_applicable_report() {
        let report = FillReport::not_applicable();
        assert!(report.success);
        assert_eq!(report.attempted, 0);
        assert!(!report.cancelled);
    }

    #[test]
    fn test_settle_read() {
        assert_eq!(settle_read("k", Ok(Some("v".to_string()))).unwrap(), Some("v".to_string()));
        assert_eq!(settle_read("k", Err(StoreError::rejected("a:1", "WRONGTYPE"))).unwrap(), None);
        assert!(matches!(
            settle_read("k", Err(StoreError::unavailable("a:1", "refused"))),
            Err(TopologyError::Connection { .. })
        ));
    }

    #[test]
    fn test_settle_write() {
        assert!(settle_write("k", Ok(true)).unwrap());
        assert!(!settle_write("k", Err(StoreError::rejected("a:1", "READONLY"))).unwrap());
        assert!(settle_write("k", Err(StoreError::unavailable("a:1", "refused"))).is_err());
    }
}
