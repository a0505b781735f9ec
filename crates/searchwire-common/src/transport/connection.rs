use std::io::{self, BufReader, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};

use crate::protocol::error::{Result, SearchwireError};
use crate::protocol::{Method, RestRequest, RestResponse};
use crate::server::Server;
use crate::transport::codec::Codec;
use crate::transport::socket::SocketSettings;

/// Lifecycle of a [`Connection`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No socket; the initial state and the state after `close()`
    Closed,
    /// Connected and usable
    Open,
    /// An I/O error occurred on the open socket; the socket has been dropped
    Faulted,
}

/// A blocking channel to exactly one server.
///
/// Connections are created per request by the connection provider and are
/// exclusively owned by the call that opened them. A fault during
/// send/receive drops the socket and leaves the connection `Faulted`; there
/// is no reconnect, callers acquire a new connection instead.
///
/// # Example
///
/// ```no_run
/// use searchwire_common::{Method, RestRequest, Server};
/// use searchwire_common::transport::{Codec, Connection, SocketSettings};
///
/// let mut conn = Connection::new(
///     Server::new("127.0.0.1", 9200),
///     SocketSettings::default(),
///     Codec::default(),
/// );
/// conn.open()?;
/// let response = conn.transmit(&RestRequest::new(Method::Get, "/"))?;
/// conn.close();
/// # Ok::<(), searchwire_common::SearchwireError>(())
/// ```
#[derive(Debug)]
pub struct Connection {
    server: Server,
    settings: SocketSettings,
    codec: Codec,
    stream: Option<BufReader<TcpStream>>,
    state: ConnectionState,
}

impl Connection {
    pub fn new(server: Server, settings: SocketSettings, codec: Codec) -> Self {
        Self {
            server,
            settings,
            codec,
            stream: None,
            state: ConnectionState::Closed,
        }
    }

    pub fn server(&self) -> &Server {
        &self.server
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.state == ConnectionState::Open
    }

    pub fn codec(&self) -> Codec {
        self.codec
    }

    /// Connects to the bound server.
    ///
    /// The host may resolve to several addresses; each is tried in turn
    /// until one accepts. Opening an open connection does nothing.
    ///
    /// # Errors
    ///
    /// Returns `SearchwireError::Connect` wrapping the last socket error when
    /// the host cannot be resolved, refuses, times out or is unreachable.
    pub fn open(&mut self) -> Result<()> {
        if self.is_open() {
            return Ok(());
        }

        let addrs = self
            .server
            .socket_target()
            .to_socket_addrs()
            .map_err(|e| self.connect_error(e))?;

        let mut last_err = None;
        for addr in addrs {
            match self.settings.connect(&addr) {
                Ok(stream) => {
                    self.stream = Some(BufReader::new(stream));
                    self.state = ConnectionState::Open;
                    tracing::debug!(server = %self.server, %addr, "Connection opened");
                    return Ok(());
                }
                Err(e) => last_err = Some(e),
            }
        }

        Err(self.connect_error(last_err.unwrap_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, "address resolved to no endpoints")
        })))
    }

    /// Releases the socket. Safe to call any number of times.
    pub fn close(&mut self) {
        if let Some(stream) = self.stream.take() {
            // The peer may already be gone; nothing useful to do on error.
            let _ = stream.get_ref().shutdown(Shutdown::Both);
            tracing::debug!(server = %self.server, "Connection closed");
        }
        self.state = ConnectionState::Closed;
    }

    /// Writes raw bytes and flushes them.
    pub fn send(&mut self, data: &[u8]) -> Result<()> {
        let stream = self.open_stream("sending")?;
        let result = {
            let writer = stream.get_mut();
            writer.write_all(data).and_then(|_| writer.flush())
        };
        result.map_err(|e| self.fault(SearchwireError::Io(e), "writing request"))
    }

    /// Reads one complete response with this connection's codec.
    pub fn receive(&mut self, method: Method) -> Result<RestResponse> {
        let codec = self.codec;
        let stream = self.open_stream("receiving")?;
        let result = codec.read_response(stream, method);
        result.map_err(|e| self.fault(e, "reading response"))
    }

    /// Encodes `request`, sends it and reads the response.
    pub fn transmit(&mut self, request: &RestRequest) -> Result<RestResponse> {
        let encoded = self.codec.encode_request(request, &self.server)?;
        self.send(&encoded)?;
        self.receive(request.method)
    }

    fn open_stream(&mut self, action: &str) -> Result<&mut BufReader<TcpStream>> {
        match self.stream.as_mut() {
            Some(stream) if self.state == ConnectionState::Open => Ok(stream),
            _ => Err(SearchwireError::Transport(format!(
                "Cannot use connection to {} for {}: connection is {:?}",
                self.server, action, self.state
            ))),
        }
    }

    /// Drops the socket, marks the connection faulted and maps the error.
    fn fault(&mut self, err: SearchwireError, context: &str) -> SearchwireError {
        self.stream = None;
        self.state = ConnectionState::Faulted;
        let err = match err {
            SearchwireError::Io(e) => self.map_io_error(e, context),
            other => other,
        };
        tracing::debug!(server = %self.server, error = %err, "Connection faulted");
        err
    }

    /// Map IO errors on an open connection to transport errors
    ///
    /// - Timeouts/would block -> timed out after the configured I/O timeout
    /// - Resets/aborts/EOF -> connection lost
    /// - Other IO errors -> passed through as text
    fn map_io_error(&self, err: io::Error, context: &str) -> SearchwireError {
        match err.kind() {
            io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => {
                let ms = self
                    .settings
                    .io_timeout
                    .map(|t| t.as_millis() as u64)
                    .unwrap_or(0);
                SearchwireError::Transport(format!(
                    "{} from {}: timed out after {}ms",
                    context, self.server, ms
                ))
            }
            io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::NotConnected
            | io::ErrorKind::UnexpectedEof => SearchwireError::Transport(format!(
                "{} from {}: connection lost ({})",
                context, self.server, err
            )),
            _ => SearchwireError::Transport(format!("{} from {}: {}", context, self.server, err)),
        }
    }

    fn connect_error(&self, source: io::Error) -> SearchwireError {
        SearchwireError::Connect {
            server: self.server.to_string(),
            source,
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.close();
    }
}
