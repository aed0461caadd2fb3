/// Core abstractions shared by every topology
pub mod client;
pub mod connector;
pub mod endpoint;
pub mod redis_client;

#[cfg(test)]
pub(crate) mod mock;

pub use client::{ClusterClient, Dialer, NodeClient, ReadPreference};
pub use connector::{FillReport, TopologyConnector};
pub use endpoint::Endpoint;
pub use redis_client::RedisDialer;
