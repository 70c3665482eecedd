//! You.i Engine runtime - artifact resolution and the command socket
//!
//! This crate provides the I/O underneath a session:
//!
//! - **Resolver**: turns an application reference (local path or http(s)
//!   URL) into a verified local bundle, downloading and unpacking archives
//!   and remembering results in a bounded cache
//! - **Transport**: a framed, retrying command socket to the app running the
//!   engine
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐
//! │ youi (core)  │  Session controller
//! └──────┬───────┘
//!        │
//! ┌──────▼───────┐
//! │ youi-runtime │  This crate
//! │  ┌────────┐  │
//! │  │Resolver│  │  HEAD/GET, hash, unzip, LRU + keyed guard
//! │  └────────┘  │
//! │  ┌────────┐  │
//! │  │ Trans  │  │  connect retries, youiend framing
//! │  └────────┘  │
//! └──────────────┘
//! ```
//!
//! Both halves take their I/O through traits ([`Fetcher`], [`Extractor`],
//! [`Connector`]) so tests can swap in in-memory implementations.

pub mod error;
pub mod resolver;
pub mod transport;

pub use error::{Error, Result};
pub use resolver::{AppCache, AppResolver, CacheEntry, Extractor, Fetcher, HttpFetcher, RemoteHeaders, ZipExtractor};
pub use transport::{ConnectionState, Connector, Endpoint, SocketStream, SocketTransport, TcpConnector, TransportConfig};
