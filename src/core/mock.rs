//! In-memory stand-ins for store nodes, sentinels and clusters (tests only)

use super::client::{ClusterClient, Dialer, NodeClient, ReadPreference};
use super::Endpoint;
use crate::error::{StoreError, StoreResult};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

pub fn endpoint(addr: &str) -> Endpoint {
    Endpoint::parse(addr).expect("test endpoint")
}

/// A single node with its own key space
pub struct MemoryNode {
    endpoint: Endpoint,
    data: Mutex<HashMap<String, String>>,
    replies: Mutex<HashMap<String, String>>,
    down: AtomicBool,
    read_only: AtomicBool,
    closed: AtomicBool,
    reads: AtomicUsize,
}

impl MemoryNode {
    pub fn new(addr: &str) -> Arc<Self> {
        Arc::new(Self {
            endpoint: endpoint(addr),
            data: Mutex::new(HashMap::new()),
            replies: Mutex::new(HashMap::new()),
            down: AtomicBool::new(false),
            read_only: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            reads: AtomicUsize::new(0),
        })
    }

    pub fn insert(&self, key: &str, value: &str) {
        self.data.lock().insert(key.to_string(), value.to_string());
    }

    pub fn value(&self, key: &str) -> Option<String> {
        self.data.lock().get(key).cloned()
    }

    /// Copy every key from `source`, like a replica catching up
    pub fn sync_from(&self, source: &MemoryNode) {
        let snapshot = source.data.lock().clone();
        self.data.lock().extend(snapshot);
    }

    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    pub fn set_read_only(&self, read_only: bool) {
        self.read_only.store(read_only, Ordering::SeqCst);
    }

    pub fn set_reply(&self, command: &str, reply: &str) {
        self.replies.lock().insert(command.to_string(), reply.to_string());
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    fn check_up(&self) -> StoreResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(StoreError::unavailable(&self.endpoint, "connection closed"));
        }
        if self.down.load(Ordering::SeqCst) {
            return Err(StoreError::unavailable(&self.endpoint, "connection refused"));
        }
        Ok(())
    }
}

#[async_trait]
impl NodeClient for MemoryNode {
    fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        self.check_up()?;
        self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(self.value(key))
    }

    async fn set(&self, key: &str, value: &str) -> StoreResult<bool> {
        self.check_up()?;
        if self.read_only.load(Ordering::SeqCst) {
            return Err(StoreError::rejected(
                &self.endpoint,
                "READONLY You can't write against a read only replica.",
            ));
        }
        self.insert(key, value);
        Ok(true)
    }

    async fn ping(&self) -> StoreResult<()> {
        self.check_up()
    }

    async fn command_text(&self, args: &[&str]) -> StoreResult<String> {
        self.check_up()?;
        let command = args.join(" ");
        self.replies
            .lock()
            .get(&command)
            .cloned()
            .ok_or_else(|| StoreError::rejected(&self.endpoint, format!("ERR unknown command '{command}'")))
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

type WriteFilter = Box<dyn Fn(&str) -> bool + Send + Sync>;

/// A cluster seen through its slot-routing client
pub struct MemoryCluster {
    data: Mutex<HashMap<String, String>>,
    writes: Mutex<Vec<String>>,
    read_preferences: Mutex<Vec<ReadPreference>>,
    reject_write: Mutex<Option<WriteFilter>>,
    nodes_output: Mutex<String>,
    down: AtomicBool,
    closed: AtomicBool,
}

impl MemoryCluster {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            data: Mutex::new(HashMap::new()),
            writes: Mutex::new(Vec::new()),
            read_preferences: Mutex::new(Vec::new()),
            reject_write: Mutex::new(None),
            nodes_output: Mutex::new(String::new()),
            down: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        })
    }

    /// Reject writes whose key matches `filter`
    pub fn reject_writes_where<F>(&self, filter: F)
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        *self.reject_write.lock() = Some(Box::new(filter));
    }

    pub fn set_cluster_nodes(&self, output: &str) {
        *self.nodes_output.lock() = output.to_string();
    }

    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    /// Every attempted write key, in order
    pub fn writes(&self) -> Vec<String> {
        self.writes.lock().clone()
    }

    pub fn read_preferences(&self) -> Vec<ReadPreference> {
        self.read_preferences.lock().clone()
    }

    pub fn value(&self, key: &str) -> Option<String> {
        self.data.lock().get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.data.lock().len()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn check_up(&self) -> StoreResult<()> {
        if self.closed.load(Ordering::SeqCst) || self.down.load(Ordering::SeqCst) {
            return Err(StoreError::unavailable("cluster", "all nodes unreachable"));
        }
        Ok(())
    }
}

#[async_trait]
impl ClusterClient for MemoryCluster {
    async fn get(&self, key: &str, preference: ReadPreference) -> StoreResult<Option<String>> {
        self.check_up()?;
        self.read_preferences.lock().push(preference);
        Ok(self.value(key))
    }

    async fn set(&self, key: &str, value: &str) -> StoreResult<bool> {
        self.check_up()?;
        self.writes.lock().push(key.to_string());
        let rejected = self
            .reject_write
            .lock()
            .as_ref()
            .map(|filter| filter(key))
            .unwrap_or(false);
        if rejected {
            return Err(StoreError::rejected("cluster", "CLUSTERDOWN Hash slot not served"));
        }
        self.data.lock().insert(key.to_string(), value.to_string());
        Ok(true)
    }

    async fn ping(&self) -> StoreResult<()> {
        self.check_up()
    }

    async fn cluster_nodes(&self) -> StoreResult<String> {
        self.check_up()?;
        Ok(self.nodes_output.lock().clone())
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// Dialer over a fixed set of in-memory nodes, sentinels and one cluster.
///
/// Endpoints that were never registered behave as unreachable. Sentinels
/// only know the `mymaster` service.
#[derive(Default)]
pub struct MemoryDialer {
    nodes: HashMap<Endpoint, Arc<MemoryNode>>,
    sentinels: HashMap<Endpoint, Option<Endpoint>>,
    cluster: Option<Arc<MemoryCluster>>,
    sentinel_queries: AtomicUsize,
}

impl MemoryDialer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_node(mut self, node: &Arc<MemoryNode>) -> Self {
        self.nodes.insert(node.endpoint.clone(), Arc::clone(node));
        self
    }

    /// Register a sentinel that reports `master` (or knows no such service)
    pub fn with_sentinel(mut self, sentinel: &str, master: Option<&str>) -> Self {
        self.sentinels.insert(endpoint(sentinel), master.map(endpoint));
        self
    }

    pub fn with_cluster(mut self, cluster: &Arc<MemoryCluster>) -> Self {
        self.cluster = Some(Arc::clone(cluster));
        self
    }

    pub fn sentinel_queries(&self) -> usize {
        self.sentinel_queries.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Dialer for MemoryDialer {
    async fn node(&self, endpoint: &Endpoint) -> StoreResult<Arc<dyn NodeClient>> {
        match self.nodes.get(endpoint) {
            Some(node) => {
                node.ping().await?;
                Ok(Arc::clone(node) as Arc<dyn NodeClient>)
            }
            None => Err(StoreError::unavailable(endpoint, "connection refused")),
        }
    }

    async fn cluster(&self, seeds: &[Endpoint]) -> StoreResult<Arc<dyn ClusterClient>> {
        match &self.cluster {
            Some(cluster) if !seeds.is_empty() => {
                cluster.ping().await?;
                Ok(Arc::clone(cluster) as Arc<dyn ClusterClient>)
            }
            _ => Err(StoreError::unavailable("cluster", "no seed node reachable")),
        }
    }

    async fn sentinel_master(&self, sentinel: &Endpoint, service: &str) -> StoreResult<Option<Endpoint>> {
        self.sentinel_queries.fetch_add(1, Ordering::SeqCst);
        match self.sentinels.get(sentinel) {
            Some(answer) if service == "mymaster" => Ok(answer.clone()),
            Some(_) => Ok(None),
            None => Err(StoreError::unavailable(sentinel, "connection refused")),
        }
    }
}
