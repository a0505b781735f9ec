use std::io;
use std::net::{SocketAddr, TcpStream};
use std::time::Duration;

use socket2::{Domain, Protocol, SockAddr, Socket, TcpKeepalive, Type};

/// Socket options applied to every connection.
///
/// `connect_timeout` bounds the TCP handshake and `io_timeout` bounds each
/// read and write. `None` means the operation may block indefinitely.
///
/// # Default Configuration
///
/// - no timeouts (the connection builder fills them in)
/// - OS default buffer sizes
/// - keep-alive disabled
/// - `TCP_NODELAY` enabled
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SocketSettings {
    pub connect_timeout: Option<Duration>,
    pub io_timeout: Option<Duration>,
    pub receive_buffer_size: Option<usize>,
    pub send_buffer_size: Option<usize>,
    /// Idle time before keep-alive probes start
    pub keep_alive: Option<Duration>,
    pub no_delay: bool,
}

impl Default for SocketSettings {
    fn default() -> Self {
        Self {
            connect_timeout: None,
            io_timeout: None,
            receive_buffer_size: None,
            send_buffer_size: None,
            keep_alive: None,
            no_delay: true,
        }
    }
}

impl SocketSettings {
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = non_zero(timeout);
        self
    }

    pub fn with_io_timeout(mut self, timeout: Duration) -> Self {
        self.io_timeout = non_zero(timeout);
        self
    }

    pub fn with_receive_buffer_size(mut self, size: usize) -> Self {
        self.receive_buffer_size = Some(size);
        self
    }

    pub fn with_send_buffer_size(mut self, size: usize) -> Self {
        self.send_buffer_size = Some(size);
        self
    }

    pub fn with_keep_alive(mut self, idle: Duration) -> Self {
        self.keep_alive = Some(idle);
        self
    }

    pub fn with_no_delay(mut self, no_delay: bool) -> Self {
        self.no_delay = no_delay;
        self
    }

    /// Creates a socket for `addr`, applies these settings and connects.
    pub fn connect(&self, addr: &SocketAddr) -> io::Result<TcpStream> {
        let socket = Socket::new(Domain::for_address(*addr), Type::STREAM, Some(Protocol::TCP))?;

        if let Some(size) = self.receive_buffer_size {
            socket.set_recv_buffer_size(size)?;
        }
        if let Some(size) = self.send_buffer_size {
            socket.set_send_buffer_size(size)?;
        }
        if let Some(idle) = self.keep_alive {
            socket.set_tcp_keepalive(&TcpKeepalive::new().with_time(idle))?;
        }
        socket.set_nodelay(self.no_delay)?;

        let target = SockAddr::from(*addr);
        match self.connect_timeout {
            Some(timeout) => socket.connect_timeout(&target, timeout)?,
            None => socket.connect(&target)?,
        }

        let stream: TcpStream = socket.into();
        stream.set_read_timeout(self.io_timeout)?;
        stream.set_write_timeout(self.io_timeout)?;
        Ok(stream)
    }
}

// std rejects a zero read/write timeout, so zero means "unbounded" here.
fn non_zero(timeout: Duration) -> Option<Duration> {
    if timeout.is_zero() {
        None
    } else {
        Some(timeout)
    }
}
