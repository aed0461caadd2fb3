//! Configuration management for topocache

use crate::core::Endpoint;
use crate::error::ConfigError;
use crate::modes::TopologyMode;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Environment variable that replaces `redis.mode` after the file is loaded
pub const MODE_ENV_VAR: &str = "TOPOCACHE_REDIS_MODE";

/// Main topocache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Store topology configuration
    pub redis: RedisConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Store topology configuration. Only the section matching `mode` is used.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    /// MasterReplica, Sentinel, Cluster or Consensus
    #[serde(default = "default_mode")]
    pub mode: String,
    /// Timeout for establishing each connection
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    #[serde(default)]
    pub master_replica: MasterReplicaConfig,
    #[serde(default)]
    pub sentinel: SentinelConfig,
    #[serde(default)]
    pub cluster: ClusterConfig,
    #[serde(default)]
    pub consensus: ConsensusConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MasterReplicaConfig {
    pub master: String,
    #[serde(default)]
    pub replicas: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SentinelConfig {
    /// Service name the sentinels monitor
    #[serde(default = "default_master_name")]
    pub master_name: String,
    pub sentinels: Vec<String>,
    /// Candidate data nodes; everything but the elected master is a replica
    pub nodes: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterConfig {
    pub nodes: Vec<String>,
    /// Default key count for `fill-cluster`
    #[serde(default = "default_fill_count")]
    pub fill_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsensusConfig {
    pub nodes: Vec<String>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    pub level: String,
    /// Log format (json, text)
    pub format: String,
}

fn default_mode() -> String {
    TopologyMode::MasterReplica.name().to_string()
}

fn default_connect_timeout_ms() -> u64 {
    5000
}

fn default_master_name() -> String {
    "mymaster".to_string()
}

fn default_fill_count() -> usize {
    1_000_000
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            mode: default_mode(),
            connect_timeout_ms: default_connect_timeout_ms(),
            master_replica: MasterReplicaConfig::default(),
            sentinel: SentinelConfig::default(),
            cluster: ClusterConfig::default(),
            consensus: ConsensusConfig::default(),
        }
    }
}

impl Default for MasterReplicaConfig {
    fn default() -> Self {
        Self {
            master: "127.0.0.1:6379".to_string(),
            replicas: vec!["127.0.0.1:6380".to_string()],
        }
    }
}

impl Default for SentinelConfig {
    fn default() -> Self {
        Self {
            master_name: default_master_name(),
            sentinels: vec!["127.0.0.1:26379".to_string()],
            nodes: vec!["127.0.0.1:6379".to_string(), "127.0.0.1:6380".to_string()],
        }
    }
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            nodes: vec!["127.0.0.1:7000".to_string()],
            fill_count: default_fill_count(),
        }
    }
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        Self {
            nodes: vec!["127.0.0.1:5001".to_string()],
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            redis: RedisConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl RedisConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Check the mode and every endpoint the selected mode will dial
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mode: TopologyMode = self
            .mode
            .parse()
            .map_err(|_| ConfigError::ValidationError(format!("Unsupported mode: {}", self.mode)))?;

        if self.connect_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "connect_timeout_ms must be greater than 0".to_string(),
            ));
        }

        match mode {
            TopologyMode::MasterReplica => {
                validate_endpoints("master_replica.master", std::slice::from_ref(&self.master_replica.master))?;
                validate_endpoints("master_replica.replicas", &self.master_replica.replicas)?;
            }
            TopologyMode::Sentinel => {
                if self.sentinel.master_name.trim().is_empty() {
                    return Err(ConfigError::ValidationError(
                        "sentinel.master_name cannot be empty".to_string(),
                    ));
                }
                require_nodes("sentinel.sentinels", &self.sentinel.sentinels)?;
                require_nodes("sentinel.nodes", &self.sentinel.nodes)?;
            }
            TopologyMode::Cluster => require_nodes("cluster.nodes", &self.cluster.nodes)?,
            TopologyMode::Consensus => require_nodes("consensus.nodes", &self.consensus.nodes)?,
        }

        Ok(())
    }
}

fn require_nodes(field: &str, nodes: &[String]) -> Result<(), ConfigError> {
    if nodes.is_empty() {
        return Err(ConfigError::ValidationError(format!("{} cannot be empty", field)));
    }
    validate_endpoints(field, nodes)
}

fn validate_endpoints(field: &str, nodes: &[String]) -> Result<(), ConfigError> {
    for node in nodes {
        Endpoint::parse(node).map_err(|e| ConfigError::ValidationError(format!("{}: {}", field, e)))?;
    }
    Ok(())
}

impl Config {
    /// Load configuration from TOML file, apply the environment override,
    /// then validate
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        Self::load_with_mode_override(path, std::env::var(MODE_ENV_VAR).ok())
    }

    /// Same as [`Config::load_from_file`] with the override passed in
    pub fn load_with_mode_override<P: AsRef<Path>>(path: P, mode: Option<String>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;

        let mut config: Config = toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        config.apply_mode_override(mode);
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self).map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        fs::write(path, content).map_err(|e| ConfigError::IoError(e.to_string()))?;

        Ok(())
    }

    /// Replace `redis.mode` when an override is present and non-blank
    pub fn apply_mode_override(&mut self, mode: Option<String>) {
        if let Some(mode) = mode.filter(|m| !m.trim().is_empty()) {
            tracing::info!("Topology mode overridden by {}: {}", MODE_ENV_VAR, mode);
            self.redis.mode = mode.trim().to_string();
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.redis.validate()?;

        match self.logging.level.as_str() {
            "error" | "warn" | "info" | "debug" | "trace" => {}
            _ => {
                return Err(ConfigError::ValidationError(format!(
                    "Invalid log level: {}",
                    self.logging.level
                )))
            }
        }

        match self.logging.format.as_str() {
            "json" | "text" => {}
            _ => {
                return Err(ConfigError::ValidationError(format!(
                    "Invalid log format: {}",
                    self.logging.format
                )))
            }
        }

        Ok(())
    }

    /// Create example configuration file for the given mode
    pub fn create_example_config<P: AsRef<Path>>(path: P, mode: &str) -> Result<(), ConfigError> {
        let mode: TopologyMode = mode.parse().map_err(|_| {
            ConfigError::ValidationError(
                "Mode must be one of MasterReplica, Sentinel, Cluster, Consensus".to_string(),
            )
        })?;

        let mut config = Config::default();
        config.redis.mode = mode.name().to_string();
        match mode {
            TopologyMode::MasterReplica => {
                config.redis.master_replica = MasterReplicaConfig {
                    master: "10.0.1.10:6379".to_string(),
                    replicas: vec!["10.0.1.11:6379".to_string(), "10.0.1.12:6379".to_string()],
                };
            }
            TopologyMode::Sentinel => {
                config.redis.sentinel = SentinelConfig {
                    master_name: default_master_name(),
                    sentinels: vec![
                        "10.0.1.20:26379".to_string(),
                        "10.0.1.21:26379".to_string(),
                        "10.0.1.22:26379".to_string(),
                    ],
                    nodes: vec![
                        "10.0.1.10:6379".to_string(),
                        "10.0.1.11:6379".to_string(),
                        "10.0.1.12:6379".to_string(),
                    ],
                };
            }
            TopologyMode::Cluster => {
                config.redis.cluster = ClusterConfig {
                    nodes: vec![
                        "10.0.1.30:7000".to_string(),
                        "10.0.1.31:7000".to_string(),
                        "10.0.1.32:7000".to_string(),
                    ],
                    fill_count: default_fill_count(),
                };
            }
            TopologyMode::Consensus => {
                config.redis.consensus = ConsensusConfig {
                    nodes: vec![
                        "10.0.1.40:5001".to_string(),
                        "10.0.1.41:5001".to_string(),
                        "10.0.1.42:5001".to_string(),
                    ],
                };
            }
        }

        config.save_to_file(path)
    }
}
