//! searchwire Common Types and Transport
//!
//! This crate provides the protocol definitions and the blocking transport
//! layer shared by the searchwire client and CLI.
//!
//! # Overview
//!
//! searchwire talks to a remote search engine cluster (an opaque HTTP or
//! framed binary endpoint). This crate contains the pieces that do not depend
//! on how servers are selected:
//!
//! - **Protocol Layer**: methods, status codes, requests, responses and errors
//! - **Server**: a single `host:port` endpoint
//! - **Transport Layer**: socket settings, wire codecs and the [`Connection`]
//!
//! # Wire Protocols
//!
//! - **HTTP**: `{METHOD} {path} HTTP/1.1` + headers + JSON body
//! - **Framed**: `[4-byte length prefix as u32 big-endian] + [JSON frame]`
//!
//! Connections are created per request and are never pooled. Selecting a
//! server and failing over between servers lives in `searchwire-client`.
//!
//! # Example
//!
//! ```no_run
//! use searchwire_common::{Method, RestRequest, Server};
//! use searchwire_common::transport::{Codec, Connection, SocketSettings, WireProtocol};
//!
//! let server: Server = "127.0.0.1:9200".parse().unwrap();
//! let mut conn = Connection::new(
//!     server,
//!     SocketSettings::default(),
//!     Codec::for_protocol(WireProtocol::Http),
//! );
//! conn.open().unwrap();
//!
//! let request = RestRequest::new(Method::Get, "/_status");
//! let response = conn.transmit(&request).unwrap();
//! conn.close();
//! ```

pub mod protocol;
pub mod server;
pub mod transport;

pub use protocol::*;
pub use server::Server;
pub use transport::{Connection, ConnectionState};
