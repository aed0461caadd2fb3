//! `redis` crate backed implementation of the client seams

use super::client::{ClusterClient, Dialer, NodeClient, ReadPreference};
use super::Endpoint;
use crate::error::{classify_redis_error, StoreError, StoreResult};
use crate::utils::key_slot;
use async_trait::async_trait;
use parking_lot::Mutex;
use redis::aio::ConnectionManager;
use redis::cluster::ClusterClientBuilder;
use redis::cluster_async::ClusterConnection;
use redis::cluster_routing::{Route, RoutingInfo, SingleNodeRoutingInfo, SlotAddr};
use redis::{AsyncCommands, Client, Value};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::debug;

/// Dialer that opens real connections with the `redis` client
#[derive(Debug, Clone)]
pub struct RedisDialer {
    connect_timeout: Duration,
}

impl RedisDialer {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }

    async fn with_timeout<T, F>(&self, target: &str, fut: F) -> StoreResult<T>
    where
        F: Future<Output = redis::RedisResult<T>>,
    {
        match timeout(self.connect_timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(classify_redis_error(target, e)),
            Err(_) => Err(StoreError::unavailable(
                target,
                format!("connect timed out after {}ms", self.connect_timeout.as_millis()),
            )),
        }
    }
}

impl Default for RedisDialer {
    fn default() -> Self {
        Self::new(Duration::from_millis(5000))
    }
}

#[async_trait]
impl Dialer for RedisDialer {
    async fn node(&self, endpoint: &Endpoint) -> StoreResult<Arc<dyn NodeClient>> {
        let target = endpoint.to_string();
        let client = Client::open(endpoint.redis_url()).map_err(|e| classify_redis_error(&target, e))?;
        let conn = self.with_timeout(&target, ConnectionManager::new(client)).await?;

        let node = RedisNode {
            endpoint: endpoint.clone(),
            conn: Mutex::new(Some(conn)),
        };
        node.ping().await?;

        debug!("Connected to node {}", endpoint);
        Ok(Arc::new(node))
    }

    async fn cluster(&self, seeds: &[Endpoint]) -> StoreResult<Arc<dyn ClusterClient>> {
        let target = seeds
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(",");
        let urls: Vec<String> = seeds.iter().map(Endpoint::redis_url).collect();

        let client = ClusterClientBuilder::new(urls)
            .read_from_replicas()
            .build()
            .map_err(|e| classify_redis_error(&target, e))?;
        let conn = self.with_timeout(&target, client.get_async_connection()).await?;

        let cluster = RedisCluster {
            label: format!("cluster[{target}]"),
            conn: Mutex::new(Some(conn)),
        };
        cluster.ping().await?;

        debug!("Connected to cluster via {} seed nodes", seeds.len());
        Ok(Arc::new(cluster))
    }

    async fn sentinel_master(&self, sentinel: &Endpoint, service: &str) -> StoreResult<Option<Endpoint>> {
        let target = sentinel.to_string();
        let client = Client::open(sentinel.redis_url()).map_err(|e| classify_redis_error(&target, e))?;
        let mut conn = self
            .with_timeout(&target, client.get_multiplexed_async_connection())
            .await?;

        let addr: Option<(String, u16)> = redis::cmd("SENTINEL")
            .arg("get-master-addr-by-name")
            .arg(service)
            .query_async(&mut conn)
            .await
            .map_err(|e| classify_redis_error(&target, e))?;

        match addr {
            Some((host, port)) => Endpoint::new(host, port)
                .map(Some)
                .map_err(|e| StoreError::rejected(&target, e.to_string())),
            None => Ok(None),
        }
    }
}

/// Single node handle over a reconnecting connection manager
pub struct RedisNode {
    endpoint: Endpoint,
    conn: Mutex<Option<ConnectionManager>>,
}

impl RedisNode {
    fn handle(&self) -> StoreResult<ConnectionManager> {
        self.conn
            .lock()
            .clone()
            .ok_or_else(|| StoreError::unavailable(&self.endpoint, "connection closed"))
    }
}

#[async_trait]
impl NodeClient for RedisNode {
    fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let mut conn = self.handle()?;
        conn.get::<_, Option<String>>(key)
            .await
            .map_err(|e| classify_redis_error(&self.endpoint, e))
    }

    async fn set(&self, key: &str, value: &str) -> StoreResult<bool> {
        let mut conn = self.handle()?;
        conn.set::<_, _, ()>(key, value)
            .await
            .map_err(|e| classify_redis_error(&self.endpoint, e))?;
        Ok(true)
    }

    async fn ping(&self) -> StoreResult<()> {
        let mut conn = self.handle()?;
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| classify_redis_error(&self.endpoint, e))?;
        Ok(())
    }

    async fn command_text(&self, args: &[&str]) -> StoreResult<String> {
        let (name, rest) = args
            .split_first()
            .ok_or_else(|| StoreError::rejected(&self.endpoint, "empty command"))?;

        let mut cmd = redis::cmd(name);
        for arg in rest {
            cmd.arg(*arg);
        }

        let mut conn = self.handle()?;
        let value: Value = cmd
            .query_async(&mut conn)
            .await
            .map_err(|e| classify_redis_error(&self.endpoint, e))?;
        Ok(render_value(&value))
    }

    async fn close(&self) {
        if self.conn.lock().take().is_some() {
            debug!("Closed connection to {}", self.endpoint);
        }
    }
}

/// Cluster handle that routes every command by the key's slot
pub struct RedisCluster {
    label: String,
    conn: Mutex<Option<ClusterConnection>>,
}

impl RedisCluster {
    fn handle(&self) -> StoreResult<ClusterConnection> {
        self.conn
            .lock()
            .clone()
            .ok_or_else(|| StoreError::unavailable(&self.label, "connection closed"))
    }

    async fn route(&self, cmd: &redis::Cmd, routing: RoutingInfo) -> StoreResult<Value> {
        let mut conn = self.handle()?;
        conn.route_command(cmd, routing)
            .await
            .map_err(|e| classify_redis_error(&self.label, e))
    }
}

fn slot_route(key: &str, addr: SlotAddr) -> RoutingInfo {
    RoutingInfo::SingleNode(SingleNodeRoutingInfo::SpecificNode(Route::new(key_slot(key), addr)))
}

/// Reads go to the slot's master, or to one of its replicas when preferred
fn read_route(key: &str, preference: ReadPreference) -> RoutingInfo {
    let addr = match preference {
        ReadPreference::Master => SlotAddr::Master,
        ReadPreference::PreferReplica => SlotAddr::ReplicaOptional,
    };
    slot_route(key, addr)
}

/// Writes always go to the slot's master
fn write_route(key: &str) -> RoutingInfo {
    slot_route(key, SlotAddr::Master)
}

#[async_trait]
impl ClusterClient for RedisCluster {
    async fn get(&self, key: &str, preference: ReadPreference) -> StoreResult<Option<String>> {
        let mut cmd = redis::cmd("GET");
        cmd.arg(key);
        let value = self.route(&cmd, read_route(key, preference)).await?;
        redis::from_redis_value(&value).map_err(|e| classify_redis_error(&self.label, e))
    }

    async fn set(&self, key: &str, value: &str) -> StoreResult<bool> {
        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(value);
        let reply = self.route(&cmd, write_route(key)).await?;
        Ok(is_ok_reply(&reply))
    }

    async fn ping(&self) -> StoreResult<()> {
        let cmd = redis::cmd("PING");
        self.route(&cmd, RoutingInfo::SingleNode(SingleNodeRoutingInfo::Random))
            .await?;
        Ok(())
    }

    async fn cluster_nodes(&self) -> StoreResult<String> {
        let mut cmd = redis::cmd("CLUSTER");
        cmd.arg("NODES");
        let value = self
            .route(&cmd, RoutingInfo::SingleNode(SingleNodeRoutingInfo::Random))
            .await?;
        Ok(render_value(&value))
    }

    async fn close(&self) {
        if self.conn.lock().take().is_some() {
            debug!("Closed {}", self.label);
        }
    }
}

fn is_ok_reply(value: &Value) -> bool {
    match value {
        Value::Okay => true,
        other => redis::from_redis_value::<String>(other)
            .map(|s| s.eq_ignore_ascii_case("OK"))
            .unwrap_or(false),
    }
}

fn render_value(value: &Value) -> String {
    redis::from_redis_value::<String>(value).unwrap_or_else(|_| format!("{value:?}"))
}
