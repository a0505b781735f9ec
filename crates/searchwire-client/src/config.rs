use std::time::Duration;

use searchwire_common::protocol::error::{Result, SearchwireError};
use searchwire_common::transport::{Codec, SocketSettings, WireProtocol};
use searchwire_common::Server;

use crate::provider::ConnectionProvider;
use crate::registry::{SelectionStrategy, ServerRegistry};

pub const ENV_SERVERS: &str = "SEARCHWIRE_SERVERS";
pub const ENV_TIMEOUT_MS: &str = "SEARCHWIRE_TIMEOUT_MS";
pub const ENV_PROTOCOL: &str = "SEARCHWIRE_PROTOCOL";
pub const ENV_CONNECT_TIMEOUT_MS: &str = "SEARCHWIRE_CONNECT_TIMEOUT_MS";
pub const ENV_KEEPALIVE_SECS: &str = "SEARCHWIRE_KEEPALIVE_SECS";
pub const ENV_RECV_BUFFER: &str = "SEARCHWIRE_RECV_BUFFER";

/// Transport configuration, validated into a [`ConnectionProvider`].
///
/// `timeout_ms` of 0 means "unset". With more than one server a timeout is
/// mandatory, otherwise a dead server could stall failover indefinitely.
///
/// # Example
///
/// ```no_run
/// use searchwire_client::ConnectionBuilder;
/// use searchwire_common::Server;
///
/// let provider = ConnectionBuilder::default()
///     .server(Server::new("10.0.0.1", 9200))
///     .server(Server::new("10.0.0.2", 9200))
///     .timeout_ms(2_000)
///     .build()?;
/// # Ok::<(), searchwire_common::SearchwireError>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct ConnectionBuilder {
    servers: Vec<Server>,
    timeout_ms: u64,
    socket: SocketSettings,
    protocol: WireProtocol,
    selection: SelectionStrategy,
}

impl ConnectionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads `SEARCHWIRE_*` variables, also looking in a `.env` file.
    ///
    /// Unset variables keep their defaults; malformed ones are a
    /// `Configuration` error.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| dotenvy::var(key).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut builder = Self::default();

        if let Some(list) = lookup(ENV_SERVERS) {
            builder.servers = Server::parse_list(&list)?;
        }
        if let Some(ms) = parse_var::<u64>(&lookup, ENV_TIMEOUT_MS)? {
            builder.timeout_ms = ms;
        }
        if let Some(protocol) = lookup(ENV_PROTOCOL) {
            builder.protocol = protocol.parse()?;
        }
        if let Some(ms) = parse_var::<u64>(&lookup, ENV_CONNECT_TIMEOUT_MS)? {
            builder.socket = builder.socket.with_connect_timeout(Duration::from_millis(ms));
        }
        if let Some(secs) = parse_var::<u64>(&lookup, ENV_KEEPALIVE_SECS)? {
            if secs > 0 {
                builder.socket = builder.socket.with_keep_alive(Duration::from_secs(secs));
            }
        }
        if let Some(size) = parse_var::<usize>(&lookup, ENV_RECV_BUFFER)? {
            builder.socket = builder.socket.with_receive_buffer_size(size);
        }

        Ok(builder)
    }

    pub fn server(mut self, server: Server) -> Self {
        self.servers.push(server);
        self
    }

    pub fn servers<I: IntoIterator<Item = Server>>(mut self, servers: I) -> Self {
        self.servers.extend(servers);
        self
    }

    /// Discards any configured servers, e.g. ones read from the environment.
    pub fn replace_servers<I: IntoIterator<Item = Server>>(mut self, servers: I) -> Self {
        self.servers = servers.into_iter().collect();
        self
    }

    pub fn timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn socket_settings(mut self, socket: SocketSettings) -> Self {
        self.socket = socket;
        self
    }

    pub fn protocol(mut self, protocol: WireProtocol) -> Self {
        self.protocol = protocol;
        self
    }

    pub fn selection(mut self, selection: SelectionStrategy) -> Self {
        self.selection = selection;
        self
    }

    pub fn configured_servers(&self) -> &[Server] {
        &self.servers
    }

    pub fn configured_timeout_ms(&self) -> u64 {
        self.timeout_ms
    }

    pub fn configured_protocol(&self) -> WireProtocol {
        self.protocol
    }

    /// Socket settings with the builder timeout folded in.
    ///
    /// A non-zero timeout always bounds reads and writes, and bounds the
    /// handshake unless a connect timeout was set explicitly.
    pub fn effective_socket_settings(&self) -> SocketSettings {
        let mut socket = self.socket.clone();
        if self.timeout_ms > 0 {
            let timeout = Duration::from_millis(self.timeout_ms);
            socket = socket.with_io_timeout(timeout);
            if socket.connect_timeout.is_none() {
                socket = socket.with_connect_timeout(timeout);
            }
        }
        socket
    }

    /// Validates the configuration and builds the provider.
    ///
    /// No connection is attempted here.
    pub fn build(self) -> Result<ConnectionProvider> {
        if self.servers.is_empty() {
            return Err(SearchwireError::Configuration(
                "At least one server must be configured".to_string(),
            ));
        }
        if self.servers.len() > 1 && self.timeout_ms == 0 {
            return Err(SearchwireError::Configuration(
                "A timeout must be specified when more than one server is configured".to_string(),
            ));
        }

        let socket = self.effective_socket_settings();
        let registry = ServerRegistry::with_strategy(self.servers, self.selection);

        tracing::info!(
            servers = registry.len(),
            protocol = %self.protocol,
            selection = %self.selection,
            timeout_ms = self.timeout_ms,
            "Connection provider configured"
        );

        Ok(ConnectionProvider::new(
            registry,
            socket,
            Codec::for_protocol(self.protocol),
        ))
    }
}

fn parse_var<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<T>> {
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw.trim().parse::<T>().map(Some).map_err(|_| {
            SearchwireError::Configuration(format!("Invalid value '{}' for {}", raw, key))
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_empty_server_list_rejected() {
        let err = ConnectionBuilder::new().timeout_ms(100).build().unwrap_err();
        assert!(matches!(err, SearchwireError::Configuration(_)));
    }

    #[test]
    fn test_multiple_servers_require_timeout() {
        let err = ConnectionBuilder::new()
            .server(Server::new("a", 9200))
            .server(Server::new("b", 9200))
            .build()
            .unwrap_err();
        match err {
            SearchwireError::Configuration(msg) => assert!(msg.contains("timeout")),
            other => panic!("expected Configuration error, got {:?}", other),
        }
    }

    #[test]
    fn test_single_server_without_timeout_allowed() {
        let provider = ConnectionBuilder::new()
            .server(Server::new("a", 9200))
            .build()
            .unwrap();
        assert_eq!(provider.registry().len(), 1);
        assert!(provider.socket_settings().io_timeout.is_none());
    }

    #[test]
    fn test_timeout_fills_socket_settings() {
        let builder = ConnectionBuilder::new()
            .servers([Server::new("a", 9200), Server::new("b", 9200)])
            .timeout_ms(1500);
        let socket = builder.effective_socket_settings();
        assert_eq!(socket.io_timeout, Some(Duration::from_millis(1500)));
        assert_eq!(socket.connect_timeout, Some(Duration::from_millis(1500)));
    }

    #[test]
    fn test_explicit_connect_timeout_kept() {
        let builder = ConnectionBuilder::new()
            .server(Server::new("a", 9200))
            .socket_settings(SocketSettings::default().with_connect_timeout(Duration::from_millis(50)))
            .timeout_ms(1500);
        let socket = builder.effective_socket_settings();
        assert_eq!(socket.connect_timeout, Some(Duration::from_millis(50)));
        assert_eq!(socket.io_timeout, Some(Duration::from_millis(1500)));
    }

    #[test]
    fn test_duplicate_servers_collapse_in_registry() {
        let provider = ConnectionBuilder::new()
            .servers([Server::new("a", 9200), Server::new("a", 9200)])
            .timeout_ms(100)
            .build()
            .unwrap();
        assert_eq!(provider.registry().servers(), vec![Server::new("a", 9200)]);
    }

    #[test]
    fn test_from_lookup_reads_all_keys() {
        let builder = ConnectionBuilder::from_lookup(lookup(&[
            (ENV_SERVERS, "es1:9200, es2:9201"),
            (ENV_TIMEOUT_MS, "750"),
            (ENV_PROTOCOL, "framed"),
            (ENV_CONNECT_TIMEOUT_MS, "200"),
            (ENV_KEEPALIVE_SECS, "30"),
            (ENV_RECV_BUFFER, "65536"),
        ]))
        .unwrap();

        assert_eq!(
            builder.configured_servers(),
            &[Server::new("es1", 9200), Server::new("es2", 9201)]
        );
        assert_eq!(builder.configured_timeout_ms(), 750);
        assert_eq!(builder.configured_protocol(), WireProtocol::Framed);

        let socket = builder.effective_socket_settings();
        assert_eq!(socket.connect_timeout, Some(Duration::from_millis(200)));
        assert_eq!(socket.keep_alive, Some(Duration::from_secs(30)));
        assert_eq!(socket.receive_buffer_size, Some(65536));
    }

    #[test]
    fn test_from_lookup_defaults_when_unset() {
        let builder = ConnectionBuilder::from_lookup(lookup(&[])).unwrap();
        assert!(builder.configured_servers().is_empty());
        assert_eq!(builder.configured_timeout_ms(), 0);
        assert_eq!(builder.configured_protocol(), WireProtocol::Http);
    }

    #[test]
    fn test_replace_servers_overrides_environment() {
        let builder = ConnectionBuilder::from_lookup(lookup(&[(ENV_SERVERS, "env1,env2")]))
            .unwrap()
            .replace_servers([Server::new("flag", 9300)]);
        assert_eq!(builder.configured_servers(), &[Server::new("flag", 9300)]);
    }

    #[test]
    fn test_from_lookup_rejects_malformed_values() {
        let err = ConnectionBuilder::from_lookup(lookup(&[(ENV_TIMEOUT_MS, "soon")])).unwrap_err();
        assert!(matches!(err, SearchwireError::Configuration(_)));

        let err = ConnectionBuilder::from_lookup(lookup(&[(ENV_PROTOCOL, "carrier-pigeon")])).unwrap_err();
        assert!(matches!(err, SearchwireError::Configuration(_)));
    }
}
