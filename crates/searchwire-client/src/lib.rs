//! Searchwire Client
//!
//! Failover connection handling and a REST client for a search engine
//! cluster, built on the [`searchwire_common`] transport.
//!
//! The layering, leaf first:
//!
//! - [`ServerRegistry`](registry::ServerRegistry): the candidate servers
//!   still trusted for new connections
//! - [`ConnectionBuilder`](config::ConnectionBuilder): validated transport configuration
//! - [`ConnectionProvider`](provider::ConnectionProvider): opens a connection
//!   to some live server, pruning servers that fail to connect
//! - [`RestExecutor`](executor::RestExecutor): one request per connection
//! - [`SearchClient`](client::SearchClient): index, search and admin calls
//!   with typed results from [`decode`]
//!
//! # Example
//!
//! ```no_run
//! use searchwire_client::{ConnectionBuilder, SearchClient, SearchRequest};
//! use searchwire_common::Server;
//!
//! let client = SearchClient::from_builder(
//!     ConnectionBuilder::new()
//!         .server(Server::new("10.0.0.1", 9200))
//!         .server(Server::new("10.0.0.2", 9200))
//!         .timeout_ms(2_000),
//! )?;
//!
//! client.index("twitter", "tweet", "1", r#"{"user":"kimchy"}"#)?;
//! let ids = client.search(&SearchRequest::new("twitter", "user:kimchy"))?.ids();
//! # Ok::<(), searchwire_common::SearchwireError>(())
//! ```

pub mod client;
pub mod config;
pub mod decode;
pub mod executor;
pub mod provider;
pub mod registry;

pub use client::{BulkOperation, IndexSettings, SearchClient, SearchRequest};
pub use config::ConnectionBuilder;
pub use decode::{decode_count, Document, OperateResult, SearchResult};
pub use executor::RestExecutor;
pub use provider::ConnectionProvider;
pub use registry::{SelectionStrategy, ServerRegistry};
