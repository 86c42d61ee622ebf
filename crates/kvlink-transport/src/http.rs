use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{TransportError, TransportResult};
use crate::protocol::FORM_CONTENT_TYPE;
use crate::request::{Method, Request};
use crate::traits::Transport;

/// Settings for [`HttpTransport`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HttpTransportConfig {
    /// Per-request timeout. `None` waits indefinitely.
    pub timeout: Option<Duration>,
    /// Value of the `User-Agent` header.
    pub user_agent: String,
}

impl Default for HttpTransportConfig {
    fn default() -> Self {
        Self {
            timeout: None,
            user_agent: concat!("kvlink/", env!("CARGO_PKG_VERSION")).into(),
        }
    }
}

/// `reqwest`-backed transport.
///
/// A `404` answer to a `GET` is reported as an empty body, since the store
/// uses it for keys without a value. Every other non-success status is a
/// [`TransportError::Status`].
#[derive(Clone, Debug)]
pub struct HttpTransport {
    http: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> TransportResult<Self> {
        Self::with_config(&HttpTransportConfig::default())
    }

    pub fn with_config(config: &HttpTransportConfig) -> TransportResult<Self> {
        let mut builder = reqwest::Client::builder().user_agent(config.user_agent.clone());
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder
            .build()
            .map_err(|e| TransportError::Setup(e.to_string()))?;
        Ok(Self { http })
    }

    /// Use a preconfigured `reqwest` client.
    pub fn with_client(http: reqwest::Client) -> Self {
        Self { http }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: Request) -> TransportResult<String> {
        let Request { method, url, form } = request;
        let builder = match method {
            Method::Get => self.http.get(&url),
            Method::Post => self
                .http
                .post(&url)
                .header(CONTENT_TYPE, FORM_CONTENT_TYPE)
                .body(form.unwrap_or_default()),
            Method::Delete => self.http.delete(&url),
        };

        let response = builder
            .send()
            .await
            .map_err(|e| TransportError::Connection(e.to_string()))?;
        let status = response.status();
        debug!(%method, %url, status = status.as_u16(), "http round trip");

        if method == Method::Get && status == StatusCode::NOT_FOUND {
            return Ok(String::new());
        }
        if !status.is_success() {
            warn!(%method, %url, status = status.as_u16(), "remote rejected request");
            return Err(TransportError::Status {
                method,
                url,
                status: status.as_u16(),
            });
        }

        response
            .text()
            .await
            .map_err(|e| TransportError::Body(e.to_string()))
    }
}
