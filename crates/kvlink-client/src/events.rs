use std::fmt;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::trace;

/// Classification of client notifications.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    /// A value was fetched from the remote store.
    Download,
    /// A value was written to the remote store.
    Upload,
    /// A key was deleted from the remote store.
    Delete,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Download => "download",
            Self::Upload => "upload",
            Self::Delete => "delete",
        };
        write!(f, "{s}")
    }
}

/// A notification emitted after a successful remote call.
///
/// Values are the raw (serialized) text that crossed the wire.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum KvEvent {
    Download { key: String, value: Option<String> },
    Upload { key: String, value: String },
    Delete { key: String },
}

impl KvEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Download { .. } => EventKind::Download,
            Self::Upload { .. } => EventKind::Upload,
            Self::Delete { .. } => EventKind::Delete,
        }
    }

    pub fn key(&self) -> &str {
        match self {
            Self::Download { key, .. } | Self::Upload { key, .. } | Self::Delete { key } => key,
        }
    }
}

/// Handle returned by [`ObserverBus::on`], used to remove the listener.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Filter for subscribing to a subset of events.
#[derive(Clone, Debug, Default)]
pub struct EventFilter {
    /// If set, only events of these kinds are delivered.
    pub kinds: Option<Vec<EventKind>>,
}

impl EventFilter {
    pub fn kinds(kinds: impl IntoIterator<Item = EventKind>) -> Self {
        Self {
            kinds: Some(kinds.into_iter().collect()),
        }
    }

    pub fn matches(&self, event: &KvEvent) -> bool {
        match &self.kinds {
            Some(kinds) => kinds.contains(&event.kind()),
            None => true,
        }
    }
}

/// A broadcast channel receiver for client events.
pub type EventStream = broadcast::Receiver<KvEvent>;

type Callback = Box<dyn FnMut(&KvEvent) + Send + Sync>;

struct Listener {
    id: ListenerId,
    kind: EventKind,
    once: bool,
    callback: Callback,
}

struct Subscriber {
    filter: EventFilter,
    sender: broadcast::Sender<KvEvent>,
}

/// Publish/subscribe channel for client notifications.
///
/// Callback listeners run synchronously inside the operation that emits the
/// event, before it returns. Stream subscribers receive a clone of the event
/// through a broadcast channel at the same point.
pub struct ObserverBus {
    listeners: Vec<Listener>,
    subscribers: Vec<Subscriber>,
    next_id: u64,
    channel_capacity: usize,
}

impl ObserverBus {
    pub fn new() -> Self {
        Self::with_capacity(1024)
    }

    /// Bus whose stream subscribers buffer up to `channel_capacity` events.
    pub fn with_capacity(channel_capacity: usize) -> Self {
        Self {
            listeners: Vec::new(),
            subscribers: Vec::new(),
            next_id: 0,
            channel_capacity: channel_capacity.max(1),
        }
    }

    /// Register a callback for every event of `kind`.
    pub fn on<F>(&mut self, kind: EventKind, callback: F) -> ListenerId
    where
        F: FnMut(&KvEvent) + Send + Sync + 'static,
    {
        self.register(kind, false, Box::new(callback))
    }

    /// Register a callback that is removed after its first invocation.
    pub fn once<F>(&mut self, kind: EventKind, callback: F) -> ListenerId
    where
        F: FnMut(&KvEvent) + Send + Sync + 'static,
    {
        self.register(kind, true, Box::new(callback))
    }

    /// Remove a listener. Returns `false` if it was already gone.
    pub fn off(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|l| l.id != id);
        self.listeners.len() != before
    }

    /// Subscribe to events matching `filter` as a stream.
    pub fn subscribe(&mut self, filter: EventFilter) -> EventStream {
        let (sender, receiver) = broadcast::channel(self.channel_capacity);
        self.subscribers.push(Subscriber { filter, sender });
        receiver
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Number of stream subscribers whose receivers are still alive.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .iter()
            .filter(|s| s.sender.receiver_count() > 0)
            .count()
    }

    pub(crate) fn emit(&mut self, event: KvEvent) {
        trace!(kind = %event.kind(), key = event.key(), "event emitted");

        let kind = event.kind();
        for listener in self.listeners.iter_mut().filter(|l| l.kind == kind) {
            (listener.callback)(&event);
        }
        self.listeners.retain(|l| !(l.once && l.kind == kind));

        // Closed receivers are pruned as events flow.
        self.subscribers.retain(|sub| {
            if sub.filter.matches(&event) {
                sub.sender.send(event.clone()).is_ok()
            } else {
                sub.sender.receiver_count() > 0
            }
        });
    }

    fn register(&mut self, kind: EventKind, once: bool, callback: Callback) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.listeners.push(Listener {
            id,
            kind,
            once,
            callback,
        });
        id
    }
}

impl Default for ObserverBus {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ObserverBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObserverBus")
            .field("listener_count", &self.listener_count())
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn upload(key: &str) -> KvEvent {
        KvEvent::Upload {
            key: key.into(),
            value: "1".into(),
        }
    }

    fn recorder() -> (Arc<Mutex<Vec<KvEvent>>>, impl FnMut(&KvEvent) + Send + Sync + 'static) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        (seen, move |e: &KvEvent| sink.lock().unwrap().push(e.clone()))
    }

    #[test]
    fn event_accessors() {
        let e = KvEvent::Delete { key: "k".into() };
        assert_eq!(e.kind(), EventKind::Delete);
        assert_eq!(e.key(), "k");
        assert_eq!(EventKind::Download.to_string(), "download");
    }

    #[test]
    fn listeners_receive_matching_kind_only() {
        let mut bus = ObserverBus::new();
        let (seen, cb) = recorder();
        bus.on(EventKind::Upload, cb);

        bus.emit(upload("a"));
        bus.emit(KvEvent::Delete { key: "a".into() });

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0], upload("a"));
    }

    #[test]
    fn off_removes_listener() {
        let mut bus = ObserverBus::new();
        let (seen, cb) = recorder();
        let id = bus.on(EventKind::Upload, cb);
        assert!(bus.off(id));
        assert!(!bus.off(id));

        bus.emit(upload("a"));
        assert!(seen.lock().unwrap().is_empty());
        assert_eq!(bus.listener_count(), 0);
    }

    #[test]
    fn once_fires_a_single_time() {
        let mut bus = ObserverBus::new();
        let (seen, cb) = recorder();
        bus.once(EventKind::Upload, cb);
        bus.emit(KvEvent::Delete { key: "x".into() });
        assert_eq!(bus.listener_count(), 1);

        bus.emit(upload("a"));
        bus.emit(upload("b"));
        assert_eq!(seen.lock().unwrap().len(), 1);
        assert_eq!(bus.listener_count(), 0);
    }

    #[test]
    fn stream_subscribers_filter_events() {
        let mut bus = ObserverBus::new();
        let mut deletes = bus.subscribe(EventFilter::kinds([EventKind::Delete]));
        let mut all = bus.subscribe(EventFilter::default());

        bus.emit(upload("a"));
        bus.emit(KvEvent::Delete { key: "a".into() });

        assert_eq!(deletes.try_recv().unwrap(), KvEvent::Delete { key: "a".into() });
        assert!(deletes.try_recv().is_err());
        assert_eq!(all.try_recv().unwrap(), upload("a"));
        assert_eq!(all.try_recv().unwrap().kind(), EventKind::Delete);
    }

    #[test]
    fn dropped_subscribers_are_pruned() {
        let mut bus = ObserverBus::new();
        let rx = bus.subscribe(EventFilter::default());
        assert_eq!(bus.subscriber_count(), 1);
        drop(rx);
        bus.emit(upload("a"));
        assert_eq!(bus.subscriber_count(), 0);
        assert!(bus.subscribers.is_empty());
    }
}
