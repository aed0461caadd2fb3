//! `host:port` endpoint parsing

use crate::error::EndpointError;
use std::fmt;
use std::str::FromStr;

/// A store node address
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    host: String,
    port: u16,
}

impl Endpoint {
    /// Build an endpoint from already separated parts
    pub fn new<S: Into<String>>(host: S, port: u16) -> Result<Self, EndpointError> {
        let host = host.into();
        if !valid_host(&host) {
            return Err(EndpointError::format(format!("{host}:{port}")));
        }
        if port == 0 {
            return Err(EndpointError::port(format!("{host}:{port}"), port.to_string()));
        }
        Ok(Self { host, port })
    }

    /// Parse a `host:port` string.
    ///
    /// Exactly one `:` separator is accepted, so bare IPv6 literals are
    /// rejected along with anything else that is not `host:port`.
    pub fn parse(s: &str) -> Result<Self, EndpointError> {
        let trimmed = s.trim();
        let mut parts = trimmed.split(':');
        let (host, port) = match (parts.next(), parts.next(), parts.next()) {
            (Some(host), Some(port), None) => (host, port),
            _ => return Err(EndpointError::format(trimmed)),
        };

        if !valid_host(host) {
            return Err(EndpointError::format(trimmed));
        }

        let port = match port.parse::<u16>() {
            Ok(port) if port > 0 => port,
            _ => return Err(EndpointError::port(trimmed, port)),
        };

        Ok(Self {
            host: host.to_string(),
            port,
        })
    }

    /// Parse a list of endpoint strings, failing on the first malformed one
    pub fn parse_all<S: AsRef<str>>(items: &[S]) -> Result<Vec<Self>, EndpointError> {
        items.iter().map(|s| Self::parse(s.as_ref())).collect()
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Connection URL understood by the redis client
    pub fn redis_url(&self) -> String {
        format!("redis://{}:{}/", self.host, self.port)
    }
}

fn valid_host(host: &str) -> bool {
    !host.is_empty() && !host.contains(':') && !host.chars().any(char::is_whitespace)
}

impl FromStr for Endpoint {
    type Err = EndpointError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}
