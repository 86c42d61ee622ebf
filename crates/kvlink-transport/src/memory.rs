use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use tracing::trace;

use crate::error::{TransportError, TransportResult};
use crate::protocol::{self, Endpoint};
use crate::request::{Method, Request};
use crate::traits::Transport;

/// Planned failure: once `after` matching requests have succeeded, every
/// further matching request fails.
#[derive(Clone, Copy, Debug)]
struct FailurePlan {
    method: Option<Method>,
    after: usize,
}

#[derive(Debug, Default)]
struct State {
    entries: BTreeMap<String, String>,
    log: Vec<Request>,
    failure: Option<FailurePlan>,
}

/// In-process key-value store speaking the wire protocol.
///
/// Intended for tests and embedding. Every request is recorded, including
/// ones that fail, so callers can assert exactly which remote calls an
/// operation made. Keys are listed in sorted order.
pub struct InMemoryTransport {
    endpoint: Endpoint,
    state: Mutex<State>,
}

impl InMemoryTransport {
    /// Create an empty store answering on `base`.
    pub fn new(base: impl Into<String>) -> Self {
        Self {
            endpoint: Endpoint::new(base),
            state: Mutex::new(State::default()),
        }
    }

    /// Create a store pre-populated with raw values.
    pub fn with_entries<I, K, V>(base: impl Into<String>, entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let store = Self::new(base);
        for (key, raw) in entries {
            store.seed(key, raw);
        }
        store
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Write a raw value directly, bypassing the request log. Used to
    /// simulate changes made by other clients.
    pub fn seed(&self, key: impl Into<String>, raw: impl Into<String>) {
        self.lock().entries.insert(key.into(), raw.into());
    }

    /// Remove a key directly, bypassing the request log.
    pub fn unseed(&self, key: &str) -> Option<String> {
        self.lock().entries.remove(key)
    }

    /// Raw value currently stored for `key`.
    pub fn raw(&self, key: &str) -> Option<String> {
        self.lock().entries.get(key).cloned()
    }

    /// Sorted list of stored keys.
    pub fn keys(&self) -> Vec<String> {
        self.lock().entries.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }

    /// Every request received so far, in arrival order.
    pub fn requests(&self) -> Vec<Request> {
        self.lock().log.clone()
    }

    pub fn request_count(&self) -> usize {
        self.lock().log.len()
    }

    /// Number of received requests using `method`.
    pub fn count(&self, method: Method) -> usize {
        self.lock()
            .log
            .iter()
            .filter(|r| r.method == method)
            .count()
    }

    pub fn clear_log(&self) {
        self.lock().log.clear();
    }

    /// Fail requests (optionally only those using `method`) once `after`
    /// of them have succeeded.
    pub fn fail_on(&self, method: Option<Method>, after: usize) {
        self.lock().failure = Some(FailurePlan { method, after });
    }

    /// Cancel any planned failure.
    pub fn heal(&self) {
        self.lock().failure = None;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().expect("lock poisoned")
    }

    fn key_from_url<'a>(&self, url: &'a str) -> TransportResult<&'a str> {
        url.strip_prefix(self.endpoint.as_str())
            .and_then(|rest| rest.strip_prefix('/'))
            .filter(|key| !key.is_empty())
            .ok_or_else(|| TransportError::InvalidUrl {
                url: url.to_string(),
                reason: "expected a key path under the endpoint".into(),
            })
    }

    fn apply(&self, state: &mut State, request: &Request) -> TransportResult<String> {
        match request.method {
            Method::Get if request.url == self.endpoint.list_url() => {
                let body = state
                    .entries
                    .keys()
                    .map(|k| protocol::encode_component(k))
                    .collect::<Vec<_>>()
                    .join("\n");
                Ok(body)
            }
            Method::Get => {
                let key = protocol::decode_component(self.key_from_url(&request.url)?);
                Ok(state.entries.get(&key).cloned().unwrap_or_default())
            }
            Method::Post => {
                if request.url != self.endpoint.as_str() {
                    return Err(TransportError::InvalidUrl {
                        url: request.url.clone(),
                        reason: "writes must target the endpoint root".into(),
                    });
                }
                let body = request.form.as_deref().unwrap_or_default();
                let (key, raw) = protocol::decode_form(body).ok_or_else(|| {
                    TransportError::Status {
                        method: Method::Post,
                        url: request.url.clone(),
                        status: 400,
                    }
                })?;
                state.entries.insert(key, raw);
                Ok(String::new())
            }
            Method::Delete => {
                let key = protocol::decode_component(self.key_from_url(&request.url)?);
                state.entries.remove(&key);
                Ok(String::new())
            }
        }
    }
}

#[async_trait]
impl Transport for InMemoryTransport {
    async fn send(&self, request: Request) -> TransportResult<String> {
        let mut state = self.lock();
        state.log.push(request.clone());

        if let Some(plan) = state.failure.as_mut() {
            let matches = plan.method.map_or(true, |m| m == request.method);
            if matches {
                if plan.after == 0 {
                    return Err(TransportError::Connection(format!(
                        "injected failure for {request}"
                    )));
                }
                plan.after -= 1;
            }
        }

        trace!(%request, "in-memory request");
        self.apply(&mut state, &request)
    }
}

impl std::fmt::Debug for InMemoryTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("InMemoryTransport")
            .field("endpoint", &self.endpoint.as_str())
            .field("entry_count", &state.entries.len())
            .field("request_count", &state.log.len())
            .finish()
    }
}
