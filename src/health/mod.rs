//! Health checking for the nodes a connector holds
use crate::core::{ClusterClient, NodeClient};
use futures::future::join_all;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

/// Health status of a node
#[derive(Debug, Clone, PartialEq)]
pub enum HealthStatus {
    Healthy,
    Unhealthy { reason: String },
    Timeout,
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HealthStatus::Healthy => write!(f, "Healthy"),
            HealthStatus::Unhealthy { reason } => write!(f, "Unhealthy: {}", reason),
            HealthStatus::Timeout => write!(f, "Timeout"),
        }
    }
}

impl HealthStatus {
    /// Check if the status represents a healthy node
    pub fn is_healthy(&self) -> bool {
        matches!(self, HealthStatus::Healthy)
    }
}

/// Health checker trait
#[async_trait::async_trait]
pub trait HealthChecker: Send + Sync {
    /// Human-readable name of what is being checked, e.g. `master 10.0.0.1:6379`
    fn target(&self) -> String;

    /// Perform the health check
    async fn check_health(&self) -> HealthStatus;
}

/// PING based checker for a single node connection
pub struct NodeHealthChecker {
    role: &'static str,
    node: Arc<dyn NodeClient>,
}

impl NodeHealthChecker {
    pub fn new(role: &'static str, node: Arc<dyn NodeClient>) -> Self {
        Self { role, node }
    }
}

#[async_trait::async_trait]
impl HealthChecker for NodeHealthChecker {
    fn target(&self) -> String {
        format!("{} {}", self.role, self.node.endpoint())
    }

    async fn check_health(&self) -> HealthStatus {
        tracing::debug!("Checking health of {}", self.target());
        match self.node.ping().await {
            Ok(()) => HealthStatus::Healthy,
            Err(e) => HealthStatus::Unhealthy { reason: e.to_string() },
        }
    }
}

/// PING based checker for a cluster connection
pub struct ClusterHealthChecker {
    label: String,
    cluster: Arc<dyn ClusterClient>,
}

impl ClusterHealthChecker {
    pub fn new<S: Into<String>>(label: S, cluster: Arc<dyn ClusterClient>) -> Self {
        Self {
            label: label.into(),
            cluster,
        }
    }
}

#[async_trait::async_trait]
impl HealthChecker for ClusterHealthChecker {
    fn target(&self) -> String {
        self.label.clone()
    }

    async fn check_health(&self) -> HealthStatus {
        match self.cluster.ping().await {
            Ok(()) => HealthStatus::Healthy,
            Err(e) => HealthStatus::Unhealthy { reason: e.to_string() },
        }
    }
}

/// Outcome of one check
#[derive(Debug, Clone)]
pub struct NodeHealth {
    pub target: String,
    pub status: HealthStatus,
}

/// Runs health checks with a timeout
pub struct HealthCheckManager {
    check_timeout: Duration,
}

impl HealthCheckManager {
    pub fn new(check_timeout: Duration) -> Self {
        Self { check_timeout }
    }

    /// Perform one health check with timeout
    pub async fn check(&self, checker: &dyn HealthChecker) -> HealthStatus {
        let status = match timeout(self.check_timeout, checker.check_health()).await {
            Ok(status) => status,
            Err(_) => HealthStatus::Timeout,
        };

        match &status {
            HealthStatus::Healthy => tracing::debug!("{} is healthy", checker.target()),
            HealthStatus::Unhealthy { reason } => {
                tracing::warn!("{} is unhealthy: {}", checker.target(), reason)
            }
            HealthStatus::Timeout => tracing::warn!("Health check timeout for {}", checker.target()),
        }

        status
    }

    /// Check every target concurrently, preserving input order
    pub async fn check_all(&self, checkers: &[Box<dyn HealthChecker>]) -> Vec<NodeHealth> {
        let checks = checkers.iter().map(|checker| async move {
            NodeHealth {
                target: checker.target(),
                status: self.check(checker.as_ref()).await,
            }
        });
        join_all(checks).await
    }
}

impl Default for HealthCheckManager {
    fn default() -> Self {
        Self::new(Duration::from_secs(3))
    }
}
