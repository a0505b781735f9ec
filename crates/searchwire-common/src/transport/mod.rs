//! searchwire Transport Layer
//!
//! This module provides the blocking connection and the codecs that put
//! requests on the wire and read responses back.
//!
//! # Architecture
//!
//! - **Sockets**: blocking std TCP sockets configured through `socket2`
//! - **Codec**: HTTP/1.1 or length-prefixed framed JSON
//! - **Connection**: one socket bound to one server for one request
//!
//! # Components
//!
//! - **[`SocketSettings`]**: timeouts, buffer sizes, keep-alive
//! - **[`Codec`]** / **[`HttpCodec`]** / **[`FramedCodec`]**: wire encodings
//! - **[`Connection`]**: open/close/send/receive against a single [`Server`](crate::Server)
//!
//! # Message Size Limits
//!
//! Both codecs refuse response bodies larger than 100 MB.
//!
//! # Example
//!
//! ```no_run
//! use searchwire_common::{Method, RestRequest, Server};
//! use searchwire_common::transport::{Codec, Connection, SocketSettings, WireProtocol};
//! use std::time::Duration;
//!
//! let settings = SocketSettings::default().with_io_timeout(Duration::from_millis(500));
//! let mut conn = Connection::new(
//!     Server::new("127.0.0.1", 9500),
//!     settings,
//!     Codec::for_protocol(WireProtocol::Framed),
//! );
//! conn.open().unwrap();
//! let response = conn.transmit(&RestRequest::new(Method::Get, "/")).unwrap();
//! ```

pub mod codec;
pub mod connection;
pub mod socket;

pub use codec::{Codec, FramedCodec, HttpCodec, WireProtocol, MAX_MESSAGE_SIZE};
pub use connection::{Connection, ConnectionState};
pub use socket::SocketSettings;

#[cfg(test)]
mod tests;
