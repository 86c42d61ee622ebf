use std::sync::Arc;

use async_trait::async_trait;

use crate::error::TransportResult;
use crate::request::Request;

/// Issues a request against the remote store and returns the body as text.
///
/// Implementations must report any failure to complete the round trip
/// (connection problems, non-success statuses) as a `TransportError`. An
/// empty body is a valid response, not an error.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: Request) -> TransportResult<String>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn send(&self, request: Request) -> TransportResult<String> {
        (**self).send(request).await
    }
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Box<T> {
    async fn send(&self, request: Request) -> TransportResult<String> {
        (**self).send(request).await
    }
}
