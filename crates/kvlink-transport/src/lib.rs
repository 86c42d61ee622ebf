//! Transport layer for the kvlink key-value client.
//!
//! The client core never talks HTTP directly. It builds [`Request`]s with
//! the [`protocol`] helpers and hands them to a [`Transport`], which returns
//! the response body as text.
//!
//! # Implementations
//!
//! - [`HttpTransport`] -- `reqwest`-backed transport for real endpoints
//! - [`InMemoryTransport`] -- recording stub that serves the wire protocol
//!   from an in-process map, for tests and embedding
//!
//! # Wire Protocol
//!
//! | Operation | Request |
//! |-----------|---------|
//! | read      | `GET {base}/{key}` |
//! | write     | `POST {base}` with form body `{key}={value}` |
//! | delete    | `DELETE {base}/{key}` |
//! | list keys | `GET {base}?encode=true&prefix` |
//!
//! Keys and values are percent-encoded on the way out; the key listing comes
//! back percent-encoded and newline-separated.

pub mod error;
pub mod http;
pub mod memory;
pub mod protocol;
pub mod request;
pub mod traits;

pub use error::{TransportError, TransportResult};
pub use http::{HttpTransport, HttpTransportConfig};
pub use memory::InMemoryTransport;
pub use protocol::Endpoint;
pub use request::{Method, Request};
pub use traits::Transport;
