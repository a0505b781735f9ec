use searchwire_common::protocol::error::{Result, SearchwireError};
use searchwire_common::transport::{Codec, Connection, SocketSettings};

use crate::registry::ServerRegistry;

/// Hands out open connections, pruning servers that fail to connect.
///
/// Every [`open`](Self::open) creates a fresh connection; nothing is pooled.
/// A server that refuses, times out or cannot be resolved is removed from the
/// registry for good and the next candidate is tried, until either a
/// connection opens or no servers remain.
///
/// The provider is `Send + Sync`; share it behind an `Arc`.
#[derive(Debug)]
pub struct ConnectionProvider {
    registry: ServerRegistry,
    socket: SocketSettings,
    codec: Codec,
}

impl ConnectionProvider {
    /// Prefer [`ConnectionBuilder::build`](crate::ConnectionBuilder::build),
    /// which validates the configuration first.
    pub fn new(registry: ServerRegistry, socket: SocketSettings, codec: Codec) -> Self {
        Self {
            registry,
            socket,
            codec,
        }
    }

    pub fn registry(&self) -> &ServerRegistry {
        &self.registry
    }

    pub fn socket_settings(&self) -> &SocketSettings {
        &self.socket
    }

    pub fn codec(&self) -> Codec {
        self.codec
    }

    /// Returns an open connection to some remaining server.
    ///
    /// # Errors
    ///
    /// `NoAvailableServers` once every server has been pruned. Errors other
    /// than a failed connect are returned as-is without pruning.
    pub fn open(&self) -> Result<Connection> {
        while self.registry.has_next() {
            let mut connection = match self.create_connection() {
                Some(connection) => connection,
                // Another thread pruned the last server between checks.
                None => break,
            };

            match connection.open() {
                Ok(()) => return Ok(connection),
                Err(err) if err.is_retryable_across_servers() => {
                    let server = connection.server().clone();
                    tracing::warn!(
                        server = %server,
                        error = %err,
                        remaining = self.registry.len().saturating_sub(1),
                        "Server unreachable, removing from registry"
                    );
                    self.registry.prune(&server, || connection.close());
                }
                Err(err) => return Err(err),
            }
        }

        Err(SearchwireError::NoAvailableServers)
    }

    /// A fresh, unopened connection to a picked server.
    pub fn create_connection(&self) -> Option<Connection> {
        match self.registry.pick() {
            Ok(server) => Some(Connection::new(server, self.socket.clone(), self.codec)),
            Err(_) => None,
        }
    }

    /// Closes `connection`, returning whether it was open.
    pub fn close(&self, mut connection: Connection) -> bool {
        let was_open = connection.is_open();
        connection.close();
        was_open
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::SelectionStrategy;
    use searchwire_common::Server;
    use std::collections::HashSet;
    use std::net::TcpListener;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    fn settings() -> SocketSettings {
        SocketSettings::default()
            .with_connect_timeout(Duration::from_millis(500))
            .with_io_timeout(Duration::from_millis(500))
    }

    fn dead_server() -> Server {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        Server::new("127.0.0.1", port)
    }

    /// A listening socket; the kernel backlog completes handshakes without
    /// an `accept()`.
    fn live_server() -> (TcpListener, Server) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        (listener, Server::new("127.0.0.1", port))
    }

    fn provider(servers: Vec<Server>) -> ConnectionProvider {
        ConnectionProvider::new(ServerRegistry::new(servers), settings(), Codec::default())
    }

    #[test]
    fn test_shareable_across_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ConnectionProvider>();
        assert_send_sync::<crate::RestExecutor>();
        assert_send_sync::<crate::SearchClient>();
    }

    #[test]
    fn test_dead_servers_pruned_until_live_one_found() {
        let a = dead_server();
        let b = dead_server();
        let (_listener, c) = live_server();
        let registry = ServerRegistry::with_strategy(
            vec![a.clone(), b.clone(), c.clone()],
            SelectionStrategy::RoundRobin,
        );
        let provider = ConnectionProvider::new(registry, settings(), Codec::default());

        // Cursor 0 picks A, which is pruned; cursor 1 lands on C in [B, C].
        let connection = provider.open().unwrap();
        assert_eq!(connection.server(), &c);
        assert!(connection.is_open());
        assert_eq!(provider.registry().servers(), vec![b.clone(), c.clone()]);

        // Cursor 2 picks B, which is pruned; cursor 3 lands on C.
        let connection = provider.open().unwrap();
        assert_eq!(connection.server(), &c);
        assert_eq!(provider.registry().servers(), vec![c]);
        assert!(!provider.registry().contains(&a));
        assert!(!provider.registry().contains(&b));
    }

    #[test]
    fn test_single_dead_server_exhausts_registry() {
        let provider = provider(vec![dead_server()]);
        let err = provider.open().unwrap_err();
        assert!(matches!(err, SearchwireError::NoAvailableServers));
        assert!(!provider.registry().has_next());

        // Exhaustion is terminal.
        assert!(matches!(provider.open(), Err(SearchwireError::NoAvailableServers)));
        assert!(provider.create_connection().is_none());
    }

    #[test]
    fn test_exactly_one_reachable_among_many() {
        let (_listener, live) = live_server();
        let mut servers: Vec<Server> = (0..5).map(|_| dead_server()).collect();
        servers.insert(3, live.clone());
        let provider = provider(servers);

        let connection = provider.open().unwrap();
        assert_eq!(connection.server(), &live);
        assert!(provider.registry().contains(&live));
    }

    #[test]
    fn test_live_servers_survive_open() {
        let (_l1, s1) = live_server();
        let (_l2, s2) = live_server();
        let provider = provider(vec![s1.clone(), s2.clone()]);

        for _ in 0..10 {
            assert!(provider.open().unwrap().is_open());
        }
        assert_eq!(provider.registry().servers(), vec![s1, s2]);
    }

    #[test]
    fn test_create_connection_is_unopened() {
        let (_listener, server) = live_server();
        let provider = provider(vec![server.clone()]);
        let connection = provider.create_connection().unwrap();
        assert_eq!(connection.server(), &server);
        assert!(!connection.is_open());
    }

    #[test]
    fn test_close_reports_previous_state() {
        let (_listener, server) = live_server();
        let provider = provider(vec![server]);

        let open = provider.open().unwrap();
        assert!(provider.close(open));

        let unopened = provider.create_connection().unwrap();
        assert!(!provider.close(unopened));
    }

    #[test]
    fn test_concurrent_open_leaves_consistent_registry() {
        let (_listener, live) = live_server();
        let dead: Vec<Server> = (0..4).map(|_| dead_server()).collect();
        let mut servers = dead.clone();
        servers.push(live.clone());
        let provider = Arc::new(provider(servers));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let provider = Arc::clone(&provider);
                thread::spawn(move || {
                    for _ in 0..10 {
                        let connection = provider.open().unwrap();
                        assert!(connection.is_open());
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let remaining = provider.registry().servers();
        assert!(remaining.contains(&live));
        assert!(remaining.iter().all(|s| *s == live || dead.contains(s)));
        let unique: HashSet<&Server> = remaining.iter().collect();
        assert_eq!(unique.len(), remaining.len());
    }

    #[test]
    fn test_concurrent_open_all_dead() {
        let provider = Arc::new(provider((0..3).map(|_| dead_server()).collect()));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let provider = Arc::clone(&provider);
                thread::spawn(move || provider.open().map(|_| ()))
            })
            .collect();
        for handle in handles {
            assert!(matches!(
                handle.join().unwrap(),
                Err(SearchwireError::NoAvailableServers)
            ));
        }
        assert!(provider.registry().is_empty());
    }
}
