//! Blocking facade over [`Client`].
//!
//! Each method drives the corresponding async operation to completion on a
//! private current-thread runtime, so both calling conventions share one
//! implementation of every primitive and bulk operation.
//!
//! A `BlockingClient` must not be used from inside an async runtime; the
//! nested `block_on` would panic.

use std::collections::BTreeMap;

use kvlink_transport::{Endpoint, HttpTransport, Transport};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::runtime::{Builder, Runtime};

use crate::cache::Cache;
use crate::client::Client;
use crate::config::ClientConfig;
use crate::error::KvResult;
use crate::events::{EventFilter, EventKind, EventStream, KvEvent, ListenerId, ObserverBus};
use crate::options::ReadOptions;

/// Blocking client: every call returns only after all of its remote
/// requests have completed.
pub struct BlockingClient<T> {
    inner: Client<T>,
    runtime: Runtime,
}

impl BlockingClient<HttpTransport> {
    /// Build a blocking client talking HTTP to the configured endpoint.
    pub fn connect(config: ClientConfig) -> KvResult<Self> {
        Self::from_client(Client::connect(config)?)
    }
}

impl<T: Transport> BlockingClient<T> {
    pub fn new(transport: T, config: ClientConfig) -> KvResult<Self> {
        Self::from_client(Client::new(transport, config)?)
    }

    /// Wrap an existing async client, keeping its cache and listeners.
    pub fn from_client(inner: Client<T>) -> KvResult<Self> {
        let runtime = Builder::new_current_thread().enable_all().build()?;
        Ok(Self { inner, runtime })
    }

    /// Unwrap into the async client, keeping its cache and listeners.
    pub fn into_async(self) -> Client<T> {
        self.inner
    }

    // ---- Accessors ----

    pub fn endpoint(&self) -> &Endpoint {
        self.inner.endpoint()
    }

    pub fn transport(&self) -> &T {
        self.inner.transport()
    }

    pub fn cache(&self) -> &Cache {
        self.inner.cache()
    }

    pub fn clear_cache(&mut self) {
        self.inner.clear_cache();
    }

    pub fn cache_by_default(&self) -> bool {
        self.inner.cache_by_default()
    }

    pub fn set_cache_by_default(&mut self, enabled: bool) {
        self.inner.set_cache_by_default(enabled);
    }

    pub fn events(&self) -> &ObserverBus {
        self.inner.events()
    }

    pub fn on<F>(&mut self, kind: EventKind, callback: F) -> ListenerId
    where
        F: FnMut(&KvEvent) + Send + Sync + 'static,
    {
        self.inner.on(kind, callback)
    }

    pub fn once<F>(&mut self, kind: EventKind, callback: F) -> ListenerId
    where
        F: FnMut(&KvEvent) + Send + Sync + 'static,
    {
        self.inner.once(kind, callback)
    }

    pub fn off(&mut self, id: ListenerId) -> bool {
        self.inner.off(id)
    }

    pub fn subscribe(&mut self, filter: EventFilter) -> EventStream {
        self.inner.subscribe(filter)
    }

    // ---- Remote primitives ----

    pub fn read_one(
        &mut self,
        key: &str,
        force: bool,
        cache_after: bool,
    ) -> KvResult<Option<String>> {
        self.runtime.block_on(self.inner.read_one(key, force, cache_after))
    }

    pub fn write_one(&mut self, key: &str, raw: &str, cache_after: bool) -> KvResult<()> {
        self.runtime.block_on(self.inner.write_one(key, raw, cache_after))
    }

    pub fn delete_one(&mut self, key: &str) -> KvResult<bool> {
        self.runtime.block_on(self.inner.delete_one(key))
    }

    pub fn list_keys(&self) -> KvResult<Vec<String>> {
        self.runtime.block_on(self.inner.list_keys())
    }

    // ---- Values ----

    pub fn get(&mut self, key: &str) -> KvResult<Option<Value>> {
        self.runtime.block_on(self.inner.get(key))
    }

    pub fn get_with(&mut self, key: &str, options: ReadOptions) -> KvResult<Option<Value>> {
        self.runtime.block_on(self.inner.get_with(key, options))
    }

    pub fn get_as<V: DeserializeOwned>(&mut self, key: &str) -> KvResult<Option<V>> {
        self.runtime.block_on(self.inner.get_as(key))
    }

    pub fn get_as_with<V: DeserializeOwned>(
        &mut self,
        key: &str,
        options: ReadOptions,
    ) -> KvResult<Option<V>> {
        self.runtime.block_on(self.inner.get_as_with(key, options))
    }

    pub fn get_raw(&mut self, key: &str) -> KvResult<Option<String>> {
        self.runtime.block_on(self.inner.get_raw(key))
    }

    pub fn get_raw_with(&mut self, key: &str, options: ReadOptions) -> KvResult<Option<String>> {
        self.runtime.block_on(self.inner.get_raw_with(key, options))
    }

    pub fn set<V: Serialize + ?Sized>(&mut self, key: &str, value: &V) -> KvResult<&mut Self> {
        self.runtime.block_on(self.inner.set(key, value))?;
        Ok(self)
    }

    pub fn set_with<V: Serialize + ?Sized>(
        &mut self,
        key: &str,
        value: &V,
        cache: bool,
    ) -> KvResult<&mut Self> {
        self.runtime.block_on(self.inner.set_with(key, value, cache))?;
        Ok(self)
    }

    pub fn delete(&mut self, key: &str) -> KvResult<bool> {
        self.runtime.block_on(self.inner.delete(key))
    }

    pub fn keys(&self) -> KvResult<Vec<String>> {
        self.runtime.block_on(self.inner.keys())
    }

    // ---- Bulk operations ----

    pub fn entries(&mut self) -> KvResult<Vec<(String, Value)>> {
        self.runtime.block_on(self.inner.entries())
    }

    pub fn entries_with(&mut self, options: ReadOptions) -> KvResult<Vec<(String, Value)>> {
        self.runtime.block_on(self.inner.entries_with(options))
    }

    pub fn values(&mut self) -> KvResult<Vec<Value>> {
        self.runtime.block_on(self.inner.values())
    }

    pub fn values_with(&mut self, options: ReadOptions) -> KvResult<Vec<Value>> {
        self.runtime.block_on(self.inner.values_with(options))
    }

    pub fn for_each<F>(&mut self, f: F) -> KvResult<&mut Self>
    where
        F: FnMut(&str, &Value, usize),
    {
        self.runtime.block_on(self.inner.for_each(f))?;
        Ok(self)
    }

    pub fn for_each_with<F>(&mut self, f: F, options: ReadOptions) -> KvResult<&mut Self>
    where
        F: FnMut(&str, &Value, usize),
    {
        self.runtime.block_on(self.inner.for_each_with(f, options))?;
        Ok(self)
    }

    pub fn has(&mut self, key: &str) -> KvResult<bool> {
        self.runtime.block_on(self.inner.has(key))
    }

    pub fn has_with(&mut self, key: &str, options: ReadOptions) -> KvResult<bool> {
        self.runtime.block_on(self.inner.has_with(key, options))
    }

    /// See [`Client::clear`]; the same non-atomicity applies.
    pub fn clear(&mut self) -> KvResult<&mut Self> {
        self.runtime.block_on(self.inner.clear())?;
        Ok(self)
    }

    pub fn size(&self) -> KvResult<usize> {
        self.runtime.block_on(self.inner.size())
    }

    pub fn download<F>(&mut self, condition: F) -> KvResult<&mut Self>
    where
        F: FnMut(&str, &Value, usize) -> bool,
    {
        self.runtime.block_on(self.inner.download(condition))?;
        Ok(self)
    }

    pub fn download_all(&mut self) -> KvResult<&mut Self> {
        self.runtime.block_on(self.inner.download_all())?;
        Ok(self)
    }

    pub fn to_map(&mut self) -> KvResult<BTreeMap<String, Value>> {
        self.runtime.block_on(self.inner.to_map())
    }
}

impl<T> std::fmt::Debug for BlockingClient<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockingClient")
            .field("inner", &self.inner)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::KvError;
    use kvlink_transport::{InMemoryTransport, Method, Request};
    use proptest::prelude::*;
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    const BASE: &str = "http://kv.test/db";

    fn setup() -> (Arc<InMemoryTransport>, BlockingClient<Arc<InMemoryTransport>>) {
        let remote = Arc::new(InMemoryTransport::new(BASE));
        let client =
            BlockingClient::new(remote.clone(), ClientConfig::with_endpoint(BASE)).unwrap();
        (remote, client)
    }

    #[test]
    fn construction_requires_endpoint() {
        let err = BlockingClient::new(InMemoryTransport::new(BASE), ClientConfig::default())
            .unwrap_err();
        assert!(matches!(err, KvError::Configuration(_)));
    }

    #[test]
    fn end_to_end_example() {
        let (_, mut db) = setup();
        assert_eq!(db.get("hello").unwrap(), None);

        db.set("a", "x").unwrap().set("b", &42).unwrap();
        assert_eq!(db.keys().unwrap(), vec!["a", "b"]);
        assert_eq!(db.get("a").unwrap(), Some(json!("x")));
        assert!(db.delete("a").unwrap());
        assert!(!db.delete("a").unwrap());
        assert_eq!(db.keys().unwrap(), vec!["b"]);
    }

    #[test]
    fn cached_get_makes_no_request() {
        let (remote, mut db) = setup();
        db.set_with("k", &[1, 2, 3], true).unwrap();
        let before = remote.request_count();
        assert_eq!(db.get("k").unwrap(), Some(json!([1, 2, 3])));
        assert_eq!(remote.request_count(), before);
    }

    #[test]
    fn forced_get_refreshes_divergent_value() {
        let (remote, mut db) = setup();
        db.set_with("k", "mine", true).unwrap();
        remote.seed("k", "\"theirs\"");
        remote.clear_log();

        assert_eq!(db.get_with("k", ReadOptions::forced()).unwrap(), Some(json!("theirs")));
        assert_eq!(remote.request_count(), 1);
        assert_eq!(db.cache().get("k"), Some("\"theirs\""));
    }

    #[test]
    fn clear_seeded_store() {
        let (remote, mut db) = setup();
        for key in ["a", "b", "c", "d"] {
            remote.seed(key, "1");
        }
        db.download_all().unwrap();
        assert_eq!(db.cache().len(), 4);

        db.clear().unwrap();
        assert!(remote.is_empty());
        assert!(db.cache().is_empty());
        assert_eq!(db.size().unwrap(), 0);
    }

    #[test]
    fn has_quirk_matches_async_client() {
        let (_, mut db) = setup();
        db.set("zero", &0).unwrap();
        db.set("f", &false).unwrap();
        db.set("s", "").unwrap();
        db.set("t", "text").unwrap();
        assert!(!db.has("zero").unwrap());
        assert!(!db.has("f").unwrap());
        assert!(!db.has("s").unwrap());
        assert!(db.has("t").unwrap());
    }

    #[test]
    fn for_each_and_to_map() {
        let (remote, mut db) = setup();
        remote.seed("one", "1");
        remote.seed("two", "2");

        let mut total = 0;
        db.for_each(|_, value, _| total += value.as_i64().unwrap_or(0)).unwrap();
        assert_eq!(total, 3);

        let map = db.to_map().unwrap();
        assert_eq!(map.get("two"), Some(&json!(2)));
    }

    #[test]
    fn wraps_and_unwraps_async_client() {
        let (_, mut db) = setup();
        db.set("k", &1).unwrap();
        let client = db.into_async();
        assert_eq!(client.cache().get("k"), Some("1"));
        let db = BlockingClient::from_client(client).unwrap();
        assert_eq!(db.cache().len(), 1);
    }

    /// Run the same call sequence through both modes and record what the
    /// store and the listeners observed.
    fn observe_blocking() -> (Vec<Request>, Vec<KvEvent>) {
        let (remote, mut db) = setup();
        let events = Arc::new(Mutex::new(Vec::new()));
        for kind in [EventKind::Download, EventKind::Upload, EventKind::Delete] {
            let sink = events.clone();
            db.on(kind, move |e| sink.lock().unwrap().push(e.clone()));
        }

        db.set("a", "x").unwrap();
        db.set_with("b", &42, false).unwrap();
        db.get("a").unwrap();
        db.get("b").unwrap();
        db.entries().unwrap();
        db.delete("a").unwrap();
        db.delete("zzz").unwrap();
        db.clear().unwrap();

        let events = events.lock().unwrap().clone();
        (remote.requests(), events)
    }

    fn observe_async() -> (Vec<Request>, Vec<KvEvent>) {
        let runtime = Builder::new_current_thread().enable_all().build().unwrap();
        runtime.block_on(async {
            let remote = Arc::new(InMemoryTransport::new(BASE));
            let mut client =
                Client::new(remote.clone(), ClientConfig::with_endpoint(BASE)).unwrap();
            let events = Arc::new(Mutex::new(Vec::new()));
            for kind in [EventKind::Download, EventKind::Upload, EventKind::Delete] {
                let sink = events.clone();
                client.on(kind, move |e| sink.lock().unwrap().push(e.clone()));
            }

            client.set("a", "x").await.unwrap();
            client.set_with("b", &42, false).await.unwrap();
            client.get("a").await.unwrap();
            client.get("b").await.unwrap();
            client.entries().await.unwrap();
            client.delete("a").await.unwrap();
            client.delete("zzz").await.unwrap();
            client.clear().await.unwrap();

            let events = events.lock().unwrap().clone();
            (remote.requests(), events)
        })
    }

    #[test]
    fn both_modes_are_indistinguishable() {
        let (blocking_requests, blocking_events) = observe_blocking();
        let (async_requests, async_events) = observe_async();

        assert_eq!(blocking_requests, async_requests);
        assert_eq!(blocking_events, async_events);
        assert_eq!(
            blocking_requests.iter().filter(|r| r.method == Method::Delete).count(),
            2
        );
    }

    fn json_value() -> impl Strategy<Value = Value> {
        let leaf = prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            any::<i64>().prop_map(Value::from),
            "[a-zA-Z0-9 =&%/\n]{0,12}".prop_map(Value::String),
        ];
        leaf.prop_recursive(3, 32, 6, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..6).prop_map(Value::Array),
                prop::collection::btree_map("[a-z]{1,6}", inner, 0..6)
                    .prop_map(|m| Value::Object(m.into_iter().collect())),
            ]
        })
    }

    proptest! {
        #[test]
        fn set_then_get_roundtrips(key in "[a-z][a-z0-9 _/]{0,10}", value in json_value()) {
            let (_, mut db) = setup();
            db.set(&key, &value).unwrap();
            prop_assert_eq!(db.get(&key).unwrap(), Some(value.clone()));
            prop_assert_eq!(db.get_with(&key, ReadOptions::forced()).unwrap(), Some(value));
        }
    }
}
