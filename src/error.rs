//! Unified error handling for topocache
//!
//! Construction-time failures (bad endpoints, unknown modes, unreachable
//! nodes) are fatal and travel up to the process entry point. Per-call
//! outcomes such as "key not found" or "write declined" are plain values and
//! never show up here, with the exception of a node that is unreachable or an
//! operation the active topology does not offer.

use std::fmt;
use thiserror::Error;

/// Main error type for topology operations
#[derive(Debug, Error)]
pub enum TopologyError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Malformed `host:port` strings
    #[error("Endpoint error: {0}")]
    Endpoint(#[from] EndpointError),

    /// The configured topology mode is not one we know about
    #[error("Unsupported topology mode: {0}")]
    UnsupportedMode(String),

    /// Required nodes could not be reached, either while building a
    /// connector or on a targeted call
    #[error("Connection error: {message}")]
    Connection { message: String },

    /// A node refused an administrative command
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// The active topology has no meaningful implementation of the operation
    #[error("Operation '{operation}' is not supported in {topology} mode")]
    NotSupported {
        operation: &'static str,
        topology: &'static str,
    },
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Serialize error: {0}")]
    SerializeError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

/// Endpoint parsing errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EndpointError {
    #[error("Invalid endpoint format: '{0}' (expected host:port)")]
    Format(String),

    #[error("Invalid port in endpoint '{endpoint}': {port}")]
    Port { endpoint: String, port: String },
}

/// Errors reported by a single store node or the cluster client
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The node could not be reached or the connection is gone
    #[error("{target} unavailable: {message}")]
    Unavailable { target: String, message: String },

    /// The node answered but refused the command
    #[error("{target} rejected command: {message}")]
    Rejected { target: String, message: String },
}

/// Result type alias for topology operations
pub type TopologyResult<T> = Result<T, TopologyError>;

/// Result type alias for node-level operations
pub type StoreResult<T> = Result<T, StoreError>;

impl TopologyError {
    /// Create a connection error
    pub fn connection<S: Into<String>>(message: S) -> Self {
        TopologyError::Connection {
            message: message.into(),
        }
    }

    /// Create an unsupported operation error
    pub fn not_supported(operation: &'static str, topology: &'static str) -> Self {
        TopologyError::NotSupported {
            operation,
            topology,
        }
    }

    /// Check if this error is recoverable (can retry)
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            TopologyError::Connection { .. } | TopologyError::Store(StoreError::Unavailable { .. })
        )
    }

    /// Get error severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            TopologyError::Config(_) => ErrorSeverity::Critical,
            TopologyError::Endpoint(_) => ErrorSeverity::Critical,
            TopologyError::UnsupportedMode(_) => ErrorSeverity::Critical,
            TopologyError::Connection { .. } => ErrorSeverity::Error,
            TopologyError::Store(_) => ErrorSeverity::Warning,
            TopologyError::NotSupported { .. } => ErrorSeverity::Error,
        }
    }
}

/// Error severity levels for logging and monitoring
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// Critical errors that abort startup
    Critical,
    /// Errors that affect functionality but don't crash the system
    Error,
    /// Warnings about potential issues
    Warning,
    /// Informational messages about recoverable issues
    Info,
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorSeverity::Critical => write!(f, "CRITICAL"),
            ErrorSeverity::Error => write!(f, "ERROR"),
            ErrorSeverity::Warning => write!(f, "WARNING"),
            ErrorSeverity::Info => write!(f, "INFO"),
        }
    }
}

impl StoreError {
    pub fn unavailable<T: fmt::Display, S: Into<String>>(target: T, message: S) -> Self {
        StoreError::Unavailable {
            target: target.to_string(),
            message: message.into(),
        }
    }

    pub fn rejected<T: fmt::Display, S: Into<String>>(target: T, message: S) -> Self {
        StoreError::Rejected {
            target: target.to_string(),
            message: message.into(),
        }
    }

    /// Whether the connection itself is broken, as opposed to a refused command
    pub fn is_unavailable(&self) -> bool {
        matches!(self, StoreError::Unavailable { .. })
    }
}

impl EndpointError {
    pub(crate) fn format<S: Into<String>>(endpoint: S) -> Self {
        EndpointError::Format(endpoint.into())
    }

    pub(crate) fn port<S: Into<String>>(endpoint: S, port: S) -> Self {
        EndpointError::Port {
            endpoint: endpoint.into(),
            port: port.into(),
        }
    }
}

/// Split a client error into "node is gone" and "node said no"
pub(crate) fn classify_redis_error<T: fmt::Display>(target: T, err: redis::RedisError) -> StoreError {
    if err.is_io_error() || err.is_connection_dropped() || err.is_connection_refusal() || err.is_timeout() {
        StoreError::unavailable(target, err.to_string())
    } else {
        StoreError::rejected(target, err.to_string())
    }
}
