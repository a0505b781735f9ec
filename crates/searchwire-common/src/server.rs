use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use crate::protocol::error::SearchwireError;

/// Port used when a configured server omits one.
pub const DEFAULT_PORT: u16 = 9200;

/// A single endpoint hosting the remote search service.
///
/// Two servers are equal when host and port match; the weight is a hint
/// carried along for display and does not take part in equality.
#[derive(Debug, Clone)]
pub struct Server {
    host: String,
    port: u16,
    weight: u32,
}

impl Server {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            weight: 1,
        }
    }

    pub fn with_weight(mut self, weight: u32) -> Self {
        self.weight = weight;
        self
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn weight(&self) -> u32 {
        self.weight
    }

    /// `(host, port)` pair suitable for `ToSocketAddrs`.
    pub fn socket_target(&self) -> (&str, u16) {
        (self.host.as_str(), self.port)
    }

    /// Parses a comma-separated server list, skipping blank entries.
    pub fn parse_list(list: &str) -> Result<Vec<Server>, SearchwireError> {
        list.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::parse)
            .collect()
    }
}

impl PartialEq for Server {
    fn eq(&self, other: &Self) -> bool {
        self.host == other.host && self.port == other.port
    }
}

impl Eq for Server {}

impl Hash for Server {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.host.hash(state);
        self.port.hash(state);
    }
}

impl fmt::Display for Server {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

impl FromStr for Server {
    type Err = SearchwireError;

    /// Accepts `host:port`, `host` (default port) and `[v6]:port`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let s = s
            .strip_prefix("http://")
            .unwrap_or(s)
            .trim_end_matches('/');

        if s.is_empty() {
            return Err(SearchwireError::Configuration(
                "Server address is empty".to_string(),
            ));
        }

        let (host, port) = if let Some(rest) = s.strip_prefix('[') {
            let (host, tail) = rest.split_once(']').ok_or_else(|| {
                SearchwireError::Configuration(format!("Unterminated IPv6 address '{}'", s))
            })?;
            match tail.strip_prefix(':') {
                Some(port) => (host, Some(port)),
                None if tail.is_empty() => (host, None),
                None => {
                    return Err(SearchwireError::Configuration(format!(
                        "Invalid server address '{}'",
                        s
                    )))
                }
            }
        } else {
            match s.rsplit_once(':') {
                Some((host, port)) => (host, Some(port)),
                None => (s, None),
            }
        };

        if host.is_empty() {
            return Err(SearchwireError::Configuration(format!(
                "Missing host in server address '{}'",
                s
            )));
        }

        let port = match port {
            Some(p) => p.parse::<u16>().map_err(|e| {
                SearchwireError::Configuration(format!("Invalid port in '{}': {}", s, e))
            })?,
            None => DEFAULT_PORT,
        };

        Ok(Server::new(host, port))
    }
}
