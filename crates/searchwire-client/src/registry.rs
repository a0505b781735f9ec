use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::RwLock;
use rand::Rng;
use searchwire_common::protocol::error::{Result, SearchwireError};
use searchwire_common::Server;

/// How [`ServerRegistry::pick`] chooses among the remaining servers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelectionStrategy {
    /// Uniformly at random
    #[default]
    Random,
    /// Rotate through the remaining servers in configured order
    RoundRobin,
}

impl fmt::Display for SelectionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectionStrategy::Random => f.write_str("random"),
            SelectionStrategy::RoundRobin => f.write_str("round-robin"),
        }
    }
}

impl FromStr for SelectionStrategy {
    type Err = SearchwireError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "random" => Ok(SelectionStrategy::Random),
            "round-robin" | "round_robin" | "roundrobin" => Ok(SelectionStrategy::RoundRobin),
            other => Err(SearchwireError::Configuration(format!(
                "Unknown selection strategy '{}'",
                other
            ))),
        }
    }
}

/// The pool of servers still trusted for new connections.
///
/// Servers keep their configured order and are never duplicated. Once
/// removed, a server stays removed for the lifetime of the registry.
///
/// # Thread Safety
///
/// Reads (`has_next`, `pick`, `servers`) take a shared lock, removal takes
/// the exclusive lock, so registry calls may race freely between threads.
pub struct ServerRegistry {
    servers: RwLock<Vec<Server>>,
    strategy: SelectionStrategy,
    cursor: AtomicUsize,
}

impl ServerRegistry {
    /// Create a registry; later duplicates of a server are dropped.
    pub fn new(servers: Vec<Server>) -> Self {
        Self::with_strategy(servers, SelectionStrategy::default())
    }

    pub fn with_strategy(servers: Vec<Server>, strategy: SelectionStrategy) -> Self {
        let mut unique: Vec<Server> = Vec::with_capacity(servers.len());
        for server in servers {
            if !unique.contains(&server) {
                unique.push(server);
            }
        }

        Self {
            servers: RwLock::new(unique),
            strategy,
            cursor: AtomicUsize::new(0),
        }
    }

    pub fn strategy(&self) -> SelectionStrategy {
        self.strategy
    }

    /// Whether any server remains
    pub fn has_next(&self) -> bool {
        !self.servers.read().is_empty()
    }

    /// Choose a remaining server
    ///
    /// Fails with `EmptyRegistry` when every server has been removed.
    pub fn pick(&self) -> Result<Server> {
        let servers = self.servers.read();
        if servers.is_empty() {
            return Err(SearchwireError::EmptyRegistry);
        }

        let index = match self.strategy {
            SelectionStrategy::Random => rand::thread_rng().gen_range(0..servers.len()),
            SelectionStrategy::RoundRobin => {
                self.cursor.fetch_add(1, Ordering::Relaxed) % servers.len()
            }
        };
        Ok(servers[index].clone())
    }

    /// Remove a server. Returns false if it was already gone.
    pub fn remove(&self, server: &Server) -> bool {
        self.prune(server, || {})
    }

    /// Run `release` and remove `server` while holding the write lock.
    ///
    /// `release` runs even when the server was already removed by another
    /// caller, so a failed connection is always closed exactly once by its
    /// owner.
    pub fn prune<F: FnOnce()>(&self, server: &Server, release: F) -> bool {
        let mut servers = self.servers.write();
        release();
        let before = servers.len();
        servers.retain(|s| s != server);
        servers.len() != before
    }

    pub fn len(&self) -> usize {
        self.servers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        !self.has_next()
    }

    /// Snapshot of the remaining servers in configured order
    pub fn servers(&self) -> Vec<Server> {
        self.servers.read().clone()
    }

    pub fn contains(&self, server: &Server) -> bool {
        self.servers.read().contains(server)
    }
}

impl fmt::Debug for ServerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerRegistry")
            .field("servers", &*self.servers.read())
            .field("strategy", &self.strategy)
            .finish()
    }
}
