//! Client seams between the topology connectors and the store.
//!
//! Connectors never talk to the `redis` crate directly. They go through a
//! [`Dialer`] that hands out node and cluster handles, which keeps endpoint
//! discovery and routing policy testable without live servers.

use super::Endpoint;
use crate::error::StoreResult;
use async_trait::async_trait;
use std::sync::Arc;

/// Which copy of a cluster slot a read may be served from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadPreference {
    /// Always the master that owns the slot
    Master,
    /// A replica of the slot if one exists, otherwise its master
    PreferReplica,
}

/// A live connection to a single store node
#[async_trait]
pub trait NodeClient: Send + Sync {
    /// Address this handle is connected to
    fn endpoint(&self) -> &Endpoint;

    /// GET; `Ok(None)` when the key does not exist
    async fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// SET; `Ok(true)` when the node acknowledged the write
    async fn set(&self, key: &str, value: &str) -> StoreResult<bool>;

    async fn ping(&self) -> StoreResult<()>;

    /// Run an administrative command and render its reply as text
    async fn command_text(&self, args: &[&str]) -> StoreResult<String>;

    /// Release the connection. Later calls report the node as unavailable.
    async fn close(&self);
}

/// A slot-aware connection to a sharded cluster
#[async_trait]
pub trait ClusterClient: Send + Sync {
    /// GET routed to the node owning the key's slot
    async fn get(&self, key: &str, preference: ReadPreference) -> StoreResult<Option<String>>;

    /// SET routed to the master owning the key's slot
    async fn set(&self, key: &str, value: &str) -> StoreResult<bool>;

    async fn ping(&self) -> StoreResult<()>;

    /// Raw `CLUSTER NODES` output from any reachable node
    async fn cluster_nodes(&self) -> StoreResult<String>;

    async fn close(&self);
}

/// Opens connections for the connectors
#[async_trait]
pub trait Dialer: Send + Sync {
    /// Connect to a single node and verify it answers
    async fn node(&self, endpoint: &Endpoint) -> StoreResult<Arc<dyn NodeClient>>;

    /// Connect to a cluster through the given seed nodes
    async fn cluster(&self, seeds: &[Endpoint]) -> StoreResult<Arc<dyn ClusterClient>>;

    /// Ask one sentinel for the current master of `service`.
    ///
    /// `Ok(None)` means the sentinel answered but does not know the service.
    async fn sentinel_master(&self, sentinel: &Endpoint, service: &str) -> StoreResult<Option<Endpoint>>;
}
