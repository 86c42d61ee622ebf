//! Cache-coherent client for a remote, string-keyed key-value store.
//!
//! Values are JSON documents stored as text. A client keeps the raw text of
//! values it has seen in a local [`Cache`] and decides per call whether a
//! read may be served from it or must go to the remote store.
//!
//! # Calling Conventions
//!
//! - [`Client`] -- async; every operation is an `async fn`
//! - [`BlockingClient`] -- the same operations as blocking calls
//!
//! Both share one implementation, so a sequence of calls produces the same
//! remote requests and the same notifications in either mode.
//!
//! # Operations
//!
//! Four primitives talk to the store: [`Client::read_one`],
//! [`Client::write_one`], [`Client::delete_one`] and [`Client::list_keys`].
//! Everything else (`get`, `set`, `entries`, `values`, `for_each`, `has`,
//! `clear`, `size`, `download`, `to_map`) is composed from them.
//!
//! # Cache Rules
//!
//! 1. An unforced read of a cached key makes no remote call.
//! 2. A forced read always makes a remote call and, if caching is requested,
//!    replaces the cached entry with what the store returned.
//! 3. A successful cached write stores the written text; a successful delete
//!    removes the entry.
//! 4. A failed remote call never modifies the cache.
//! 5. Decoding happens on every read, cached or not.

pub mod blocking;
pub mod cache;
pub mod client;
pub mod codec;
pub mod config;
pub mod error;
pub mod events;
pub mod options;

pub use blocking::BlockingClient;
pub use cache::Cache;
pub use client::Client;
pub use config::{ClientConfig, ENDPOINT_ENV_VAR};
pub use error::{KvError, KvResult};
pub use events::{EventFilter, EventKind, EventStream, KvEvent, ListenerId, ObserverBus};
pub use options::ReadOptions;

// Re-export transport types callers need to build a client.
pub use kvlink_transport::{
    HttpTransport, HttpTransportConfig, InMemoryTransport, Transport, TransportError,
};
