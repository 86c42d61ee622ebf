use std::collections::BTreeMap;

use kvlink_transport::{protocol, Endpoint, HttpTransport, Transport};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::cache::Cache;
use crate::codec;
use crate::config::ClientConfig;
use crate::error::{validate_key, KvResult};
use crate::events::{EventFilter, EventKind, EventStream, KvEvent, ListenerId, ObserverBus};
use crate::options::ReadOptions;

/// Async client for a remote key-value store with a local raw-value cache.
///
/// Every operation is an `async fn`; suspension happens only while waiting
/// on the transport. Mutating operations take `&mut self`, so one instance
/// is driven by a single caller at a time and awaited operations take
/// effect in the order they were issued.
///
/// [`BlockingClient`](crate::BlockingClient) wraps this type to offer the
/// same operations as plain blocking calls.
pub struct Client<T> {
    transport: T,
    endpoint: Endpoint,
    cache: Cache,
    events: ObserverBus,
    cache_by_default: bool,
}

impl Client<HttpTransport> {
    /// Build a client talking HTTP to the configured endpoint.
    pub fn connect(config: ClientConfig) -> KvResult<Self> {
        let transport = HttpTransport::new()?;
        Self::new(transport, config)
    }
}

impl<T: Transport> Client<T> {
    /// Build a client over `transport`.
    ///
    /// Fails with a configuration error when `config` carries no endpoint.
    pub fn new(transport: T, config: ClientConfig) -> KvResult<Self> {
        let endpoint = Endpoint::new(config.resolve_endpoint()?);
        debug!(%endpoint, cache_by_default = config.cache_by_default, "client created");
        Ok(Self {
            transport,
            endpoint,
            cache: Cache::new(),
            events: ObserverBus::new(),
            cache_by_default: config.cache_by_default,
        })
    }

    // ---- Accessors ----

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn cache(&self) -> &Cache {
        &self.cache
    }

    /// Drop every cached value without touching the remote store.
    pub fn clear_cache(&mut self) {
        self.cache.clear();
    }

    pub fn cache_by_default(&self) -> bool {
        self.cache_by_default
    }

    pub fn set_cache_by_default(&mut self, enabled: bool) {
        self.cache_by_default = enabled;
    }

    pub fn events(&self) -> &ObserverBus {
        &self.events
    }

    pub fn events_mut(&mut self) -> &mut ObserverBus {
        &mut self.events
    }

    pub fn on<F>(&mut self, kind: EventKind, callback: F) -> ListenerId
    where
        F: FnMut(&KvEvent) + Send + Sync + 'static,
    {
        self.events.on(kind, callback)
    }

    pub fn once<F>(&mut self, kind: EventKind, callback: F) -> ListenerId
    where
        F: FnMut(&KvEvent) + Send + Sync + 'static,
    {
        self.events.once(kind, callback)
    }

    pub fn off(&mut self, id: ListenerId) -> bool {
        self.events.off(id)
    }

    pub fn subscribe(&mut self, filter: EventFilter) -> EventStream {
        self.events.subscribe(filter)
    }

    // ---- Remote primitives ----

    /// Read the raw value of `key`.
    ///
    /// Served from the cache unless `force` is set or the key is not cached.
    /// A remote read stores the result in the cache when `cache_after` is
    /// set (removing the entry if the store has no value) and emits a
    /// download event.
    pub async fn read_one(
        &mut self,
        key: &str,
        force: bool,
        cache_after: bool,
    ) -> KvResult<Option<String>> {
        validate_key(key)?;
        if !force {
            if let Some(raw) = self.cache.get(key) {
                debug!(key, "cache hit");
                return Ok(Some(raw.to_string()));
            }
        }

        let body = self.transport.send(self.endpoint.read(key)).await?;
        let value = (!body.is_empty()).then_some(body);
        debug!(key, force, cache_after, found = value.is_some(), "remote read");

        if cache_after {
            match &value {
                Some(raw) => {
                    self.cache.insert(key, raw.clone());
                }
                None => {
                    self.cache.remove(key);
                }
            }
        }
        self.events.emit(KvEvent::Download {
            key: key.to_string(),
            value: value.clone(),
        });
        Ok(value)
    }

    /// Write a raw value, caching it when `cache_after` is set.
    pub async fn write_one(&mut self, key: &str, raw: &str, cache_after: bool) -> KvResult<()> {
        validate_key(key)?;
        self.transport.send(self.endpoint.write(key, raw)).await?;
        debug!(key, cache_after, bytes = raw.len(), "remote write");

        if cache_after {
            self.cache.insert(key, raw);
        }
        self.events.emit(KvEvent::Upload {
            key: key.to_string(),
            value: raw.to_string(),
        });
        Ok(())
    }

    /// Delete `key`, returning whether it had a value.
    ///
    /// The delete endpoint does not report existence, so a forced read is
    /// issued first; when it finds nothing no delete request is sent.
    pub async fn delete_one(&mut self, key: &str) -> KvResult<bool> {
        validate_key(key)?;
        if self.read_one(key, true, false).await?.is_none() {
            debug!(key, "delete skipped, no value");
            return Ok(false);
        }

        self.transport.send(self.endpoint.delete(key)).await?;
        debug!(key, "remote delete");
        self.events.emit(KvEvent::Delete {
            key: key.to_string(),
        });
        self.cache.remove(key);
        Ok(true)
    }

    /// List every key in the store, in the order the store returns them.
    /// Never served from the cache.
    pub async fn list_keys(&self) -> KvResult<Vec<String>> {
        let body = self.transport.send(self.endpoint.list_keys()).await?;
        let keys = protocol::parse_key_list(&body);
        debug!(count = keys.len(), "remote key listing");
        Ok(keys)
    }

    // ---- Values ----

    /// Decoded value of `key`, from the cache when present.
    pub async fn get(&mut self, key: &str) -> KvResult<Option<Value>> {
        self.get_as_with(key, ReadOptions::new()).await
    }

    pub async fn get_with(&mut self, key: &str, options: ReadOptions) -> KvResult<Option<Value>> {
        self.get_as_with(key, options).await
    }

    /// Decode the value of `key` into `V`.
    pub async fn get_as<V: DeserializeOwned>(&mut self, key: &str) -> KvResult<Option<V>> {
        self.get_as_with(key, ReadOptions::new()).await
    }

    pub async fn get_as_with<V: DeserializeOwned>(
        &mut self,
        key: &str,
        options: ReadOptions,
    ) -> KvResult<Option<V>> {
        let raw = self.get_raw_with(key, options).await?;
        codec::decode(key, raw.as_deref())
    }

    /// Raw stored text of `key`, without decoding.
    pub async fn get_raw(&mut self, key: &str) -> KvResult<Option<String>> {
        self.get_raw_with(key, ReadOptions::new()).await
    }

    pub async fn get_raw_with(
        &mut self,
        key: &str,
        options: ReadOptions,
    ) -> KvResult<Option<String>> {
        let cache = options.cache_or(self.cache_by_default);
        self.read_one(key, options.force, cache).await
    }

    /// Serialize and store `value` under `key`.
    pub async fn set<V: Serialize + ?Sized>(
        &mut self,
        key: &str,
        value: &V,
    ) -> KvResult<&mut Self> {
        let cache = self.cache_by_default;
        self.set_with(key, value, cache).await
    }

    /// Like [`Client::set`] with an explicit cache directive.
    ///
    /// Serialization failures are reported before any remote call.
    pub async fn set_with<V: Serialize + ?Sized>(
        &mut self,
        key: &str,
        value: &V,
        cache: bool,
    ) -> KvResult<&mut Self> {
        validate_key(key)?;
        let raw = codec::encode(key, value)?;
        self.write_one(key, &raw, cache).await?;
        Ok(self)
    }

    pub async fn delete(&mut self, key: &str) -> KvResult<bool> {
        self.delete_one(key).await
    }

    pub async fn keys(&self) -> KvResult<Vec<String>> {
        self.list_keys().await
    }

    // ---- Bulk operations ----

    /// Every key with its decoded value, in listing order. Forces remote
    /// reads.
    pub async fn entries(&mut self) -> KvResult<Vec<(String, Value)>> {
        self.entries_with(ReadOptions::forced()).await
    }

    /// Keys whose read yields no value map to `Value::Null`.
    pub async fn entries_with(&mut self, options: ReadOptions) -> KvResult<Vec<(String, Value)>> {
        let keys = self.list_keys().await?;
        let mut entries = Vec::with_capacity(keys.len());
        for key in keys {
            let value = self.value_or_null(&key, options).await?;
            entries.push((key, value));
        }
        Ok(entries)
    }

    pub async fn values(&mut self) -> KvResult<Vec<Value>> {
        self.values_with(ReadOptions::forced()).await
    }

    pub async fn values_with(&mut self, options: ReadOptions) -> KvResult<Vec<Value>> {
        let entries = self.entries_with(options).await?;
        Ok(entries.into_iter().map(|(_, value)| value).collect())
    }

    /// Call `f(key, value, index)` for every key in listing order.
    pub async fn for_each<F>(&mut self, f: F) -> KvResult<&mut Self>
    where
        F: FnMut(&str, &Value, usize),
    {
        self.for_each_with(f, ReadOptions::new()).await
    }

    pub async fn for_each_with<F>(&mut self, mut f: F, options: ReadOptions) -> KvResult<&mut Self>
    where
        F: FnMut(&str, &Value, usize),
    {
        let keys = self.list_keys().await?;
        for (index, key) in keys.iter().enumerate() {
            let value = self.value_or_null(key, options).await?;
            f(key.as_str(), &value, index);
        }
        Ok(self)
    }

    /// Whether `key` holds a truthy value.
    ///
    /// Stored `null`, `false`, `0` and `""` are reported as absent.
    pub async fn has(&mut self, key: &str) -> KvResult<bool> {
        self.has_with(key, ReadOptions::new()).await
    }

    pub async fn has_with(&mut self, key: &str, options: ReadOptions) -> KvResult<bool> {
        let value = self.get_with(key, options).await?;
        Ok(value.as_ref().is_some_and(codec::is_truthy))
    }

    /// Delete every listed key, then empty the cache.
    ///
    /// Keys are deleted one request at a time. This is not atomic: a key
    /// written by another client after the listing survives the call.
    pub async fn clear(&mut self) -> KvResult<&mut Self> {
        let keys = self.list_keys().await?;
        let mut deleted = 0usize;
        for key in &keys {
            if self.delete_one(key).await? {
                deleted += 1;
            }
        }
        self.cache.clear();
        info!(listed = keys.len(), deleted, "store cleared");
        Ok(self)
    }

    /// Number of keys in the store. Always asks the remote store.
    pub async fn size(&self) -> KvResult<usize> {
        Ok(self.list_keys().await?.len())
    }

    /// Fetch every value and cache those for which
    /// `condition(key, value, index)` holds.
    ///
    /// Turns `cache_by_default` on for the rest of the client's life.
    pub async fn download<F>(&mut self, mut condition: F) -> KvResult<&mut Self>
    where
        F: FnMut(&str, &Value, usize) -> bool,
    {
        self.cache_by_default = true;
        let keys = self.list_keys().await?;
        let mut cached = 0usize;
        for (index, key) in keys.iter().enumerate() {
            let Some(raw) = self.read_one(key, true, false).await? else {
                continue;
            };
            let value: Value = codec::decode(key, Some(raw.as_str()))?.unwrap_or(Value::Null);
            if condition(key.as_str(), &value, index) {
                self.cache.insert(key.as_str(), raw);
                cached += 1;
            }
        }
        info!(listed = keys.len(), cached, "download complete");
        Ok(self)
    }

    /// [`Client::download`] without a filter.
    pub async fn download_all(&mut self) -> KvResult<&mut Self> {
        self.download(|_, _, _| true).await
    }

    /// Snapshot of the whole store as a map, read with forced requests.
    pub async fn to_map(&mut self) -> KvResult<BTreeMap<String, Value>> {
        let entries = self.entries_with(ReadOptions::forced()).await?;
        Ok(entries.into_iter().collect())
    }

    async fn value_or_null(&mut self, key: &str, options: ReadOptions) -> KvResult<Value> {
        Ok(self.get_with(key, options).await?.unwrap_or(Value::Null))
    }
}

impl<T> std::fmt::Debug for Client<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("endpoint", &self.endpoint.as_str())
            .field("cached_keys", &self.cache.len())
            .field("cache_by_default", &self.cache_by_default)
            .field("events", &self.events)
            .finish()
    }
}
